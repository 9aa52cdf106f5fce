// Header normalization shared by the readers.

use std::path::Path;

use census_reduce::{fields, Level};

// The headers of the TSE aggregated tables, and their canonical names.
const HEADER_ALIASES: [(&str, &str); 34] = [
    ("estado", fields::STATE),
    ("municipio", fields::MUNICIPALITY),
    ("aptos", fields::ELIGIBLE_VOTERS),
    ("eleitorado_feminino", fields::FEMALE_VOTERS),
    ("eleitorado_masculino", fields::MALE_VOTERS),
    ("analfabeto", fields::ILLITERATE),
    ("eleitores_deficiencia", fields::VOTERS_WITH_DISABILITY),
    ("comparecimento_percentual(%)", fields::TURNOUT_PERCENT),
    ("abstencao_percentual(%)", fields::ABSTENTION_PERCENT),
    ("eleitorado_masculino_percentual(%)", fields::MALE_PERCENT),
    ("eleitorado_feminino_percentual(%)", fields::FEMALE_PERCENT),
    (
        "eleitores_deficiencia_percentual(%)",
        fields::VOTERS_WITH_DISABILITY_PERCENT,
    ),
    (
        "eleitorado_facultativo_percentual(%)",
        fields::OPTIONAL_VOTERS_PERCENT,
    ),
    ("analfabeto_percentual(%)", fields::ILLITERATE_PERCENT),
    ("le_escreve_percentual(%)", fields::READS_WRITES_PERCENT),
    (
        "fundamental_incompleto_percentual(%)",
        fields::ELEMENTARY_INCOMPLETE_PERCENT,
    ),
    (
        "fundamental_completo_percentual(%)",
        fields::ELEMENTARY_COMPLETE_PERCENT,
    ),
    (
        "medio_incompleto_percentual(%)",
        fields::HIGH_SCHOOL_INCOMPLETE_PERCENT,
    ),
    (
        "medio_completo_percentual(%)",
        fields::HIGH_SCHOOL_COMPLETE_PERCENT,
    ),
    (
        "superior_incompleto_percentual(%)",
        fields::HIGHER_INCOMPLETE_PERCENT,
    ),
    (
        "superior_completo_percentual(%)",
        fields::HIGHER_COMPLETE_PERCENT,
    ),
    ("16_anos_percentual(%)", fields::YOUTH_AGES[0]),
    ("17_anos_percentual(%)", fields::YOUTH_AGES[1]),
    ("65_69_anos_percentual(%)", fields::ELDERLY_AGES[0]),
    ("70_74_anos_percentual(%)", fields::ELDERLY_AGES[1]),
    ("75_79_anos_percentual(%)", fields::ELDERLY_AGES[2]),
    ("80_84_anos_percentual(%)", fields::ELDERLY_AGES[3]),
    ("85_89_anos_percentual(%)", fields::ELDERLY_AGES[4]),
    ("90_94_anos_percentual(%)", fields::ELDERLY_AGES[5]),
    ("95_99_anos_percentual(%)", fields::ELDERLY_AGES[6]),
    ("100_anos_percentual(%)", fields::ELDERLY_AGES[7]),
    // Spellings with accents found in some exports.
    ("município", fields::MUNICIPALITY),
    ("abstenção_percentual(%)", fields::ABSTENTION_PERCENT),
    ("lê_escreve_percentual(%)", fields::READS_WRITES_PERCENT),
];

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Maps a header of the source files to its canonical name. Unknown headers
/// are only trimmed.
pub fn normalize_header(raw: &str) -> String {
    let s = raw.trim_start_matches('\u{feff}').trim();
    HEADER_ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(s))
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| s.to_string())
}

/// A table with a municipality column is a municipality-level table.
pub fn infer_level(columns: &[String]) -> Level {
    if columns.iter().any(|c| c == fields::MUNICIPALITY) {
        Level::Municipality
    } else {
        Level::State
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_tse_headers() {
        assert_eq!(normalize_header("estado"), "state");
        assert_eq!(normalize_header("\u{feff}estado"), "state");
        assert_eq!(normalize_header(" Municipio "), "municipality");
        assert_eq!(
            normalize_header("superior_completo_percentual(%)"),
            "higher_complete_percent"
        );
        assert_eq!(normalize_header("100_anos_percentual(%)"), "age_100_percent");
        // Canonical and unknown headers pass through.
        assert_eq!(normalize_header("turnout_percent"), "turnout_percent");
        assert_eq!(normalize_header("codigo_ibge"), "codigo_ibge");
    }

    #[test]
    fn levels() {
        let state = vec!["state".to_string(), "aptos".to_string()];
        assert_eq!(infer_level(&state), Level::State);
        let municipality = vec!["state".to_string(), "municipality".to_string()];
        assert_eq!(infer_level(&municipality), Level::Municipality);
    }

    #[test]
    fn file_names() {
        assert_eq!(
            simplify_file_name("data/df_estados_1turno_2020.csv"),
            "df_estados_1turno_2020.csv"
        );
    }
}
