use log::{debug, info};
use snafu::prelude::*;

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::*;
use crate::registry::DatasetRegistry;

/// The choices made by the user.
///
/// It only holds identifiers. The municipality is `None` for state-level
/// datasets.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Selection {
    pub dataset_id: DatasetId,
    pub state_id: String,
    pub municipality_id: Option<String>,
}

/// The distinct states of a table, in order of first appearance.
///
/// The order is not sorted on purpose: it is the order of the selector, and
/// the first entry is the default selection. Reordering the rows of the input
/// changes the defaults.
pub fn state_domain(table: &ElectionTable) -> Vec<String> {
    distinct(table.records().iter().filter_map(|r| r.state()))
}

/// The distinct municipalities of a state, in order of first appearance.
///
/// Empty for state-level tables.
pub fn municipality_domain(table: &ElectionTable, state: &str) -> Vec<String> {
    if table.level() == Level::State {
        return Vec::new();
    }
    distinct(
        table
            .records()
            .iter()
            .filter(|r| r.state().as_deref() == Some(state))
            .filter_map(|r| r.municipality()),
    )
}

fn distinct<I: Iterator<Item = String>>(it: I) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut res: Vec<String> = Vec::new();
    for s in it {
        if seen.insert(s.clone()) {
            res.push(s);
        }
    }
    res
}

fn default_selection(id: DatasetId, table: &ElectionTable) -> ReduceResult<Selection> {
    let state_id = state_domain(table)
        .into_iter()
        .next()
        .context(InvalidSelectionSnafu {
            kind: SelectionKind::Dataset,
            id: id.as_str(),
        })?;
    let municipality_id = first_municipality(table, &state_id);
    Ok(Selection {
        dataset_id: id,
        state_id,
        municipality_id,
    })
}

fn first_municipality(table: &ElectionTable, state: &str) -> Option<String> {
    municipality_domain(table, state).into_iter().next()
}

/// A user session: the current selection and the table it applies to.
///
/// Every change is validated against the domains of the active table. A
/// rejected change leaves the session as it was.
pub struct Session<'r> {
    registry: &'r DatasetRegistry,
    selection: Selection,
    table: Arc<ElectionTable>,
}

impl<'r> Session<'r> {
    /// Opens a session on the first dataset, with the default selections.
    ///
    /// Failing to load the first dataset means there is nothing to show.
    pub fn start(registry: &'r DatasetRegistry) -> ReduceResult<Session<'r>> {
        Session::with_dataset(registry, DatasetId::ALL[0])
    }

    pub fn with_dataset(registry: &'r DatasetRegistry, id: DatasetId) -> ReduceResult<Session<'r>> {
        let table = registry.load(id)?;
        let selection = default_selection(id, &table)?;
        info!("Session started: {:?}", selection);
        Ok(Session {
            registry,
            selection,
            table,
        })
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn table(&self) -> &ElectionTable {
        &self.table
    }

    pub fn dataset_id(&self) -> DatasetId {
        self.selection.dataset_id
    }

    /// Switches to another dataset and resets the state and municipality to
    /// the first ones of the new table.
    pub fn set_dataset(&mut self, id: DatasetId) -> ReduceResult<()> {
        let table = self.registry.load(id)?;
        let selection = default_selection(id, &table)?;
        info!("set_dataset: {:?}", selection);
        self.table = table;
        self.selection = selection;
        Ok(())
    }

    /// Selects a state. At the municipality level, the municipality is reset
    /// to the first one of that state.
    pub fn set_state(&mut self, id: &str) -> ReduceResult<()> {
        ensure!(
            self.state_domain().iter().any(|s| s == id),
            InvalidSelectionSnafu {
                kind: SelectionKind::State,
                id
            }
        );
        self.selection.municipality_id = first_municipality(&self.table, id);
        self.selection.state_id = id.to_string();
        debug!("set_state: {:?}", self.selection);
        Ok(())
    }

    /// Selects a municipality of the current state.
    pub fn set_municipality(&mut self, id: &str) -> ReduceResult<()> {
        ensure!(
            self.municipality_domain().iter().any(|s| s == id),
            InvalidSelectionSnafu {
                kind: SelectionKind::Municipality,
                id
            }
        );
        self.selection.municipality_id = Some(id.to_string());
        debug!("set_municipality: {:?}", self.selection);
        Ok(())
    }

    pub fn state_domain(&self) -> Vec<String> {
        state_domain(&self.table)
    }

    pub fn municipality_domain(&self) -> Vec<String> {
        municipality_domain(&self.table, &self.selection.state_id)
    }

    /// The key of the selected unit.
    pub fn key(&self) -> LookupKey {
        match &self.selection.municipality_id {
            Some(m) => LookupKey::municipality(&self.selection.state_id, m),
            None => LookupKey::state(&self.selection.state_id),
        }
    }
}
