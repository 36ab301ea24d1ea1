use shared::domain::{Incident, IncidentId};

/// The console's view of the incident list and the operator's current focus.
#[derive(Debug, Default)]
pub struct ConsoleState {
    incidents: Vec<Incident>,
    selected: Option<IncidentId>,
}

impl ConsoleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the incident list with a fresh snapshot.
    ///
    /// With nothing selected the first incident becomes the focus. A selected
    /// incident that is no longer in the snapshot stays selected by id; reads
    /// return `None` until it reappears.
    pub fn apply_incidents(&mut self, incidents: Vec<Incident>) {
        if self.selected.is_none() {
            self.selected = incidents.first().map(|incident| incident.id.clone());
        }
        self.incidents = incidents;
    }

    /// Returns `false` when `id` is not in the current list.
    pub fn select(&mut self, id: &IncidentId) -> bool {
        if self.incidents.iter().any(|incident| &incident.id == id) {
            self.selected = Some(id.clone());
            true
        } else {
            false
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected_id(&self) -> Option<&IncidentId> {
        self.selected.as_ref()
    }

    /// The selected incident as of the latest snapshot.
    pub fn selected(&self) -> Option<&Incident> {
        let id = self.selected.as_ref()?;
        self.incidents.iter().find(|incident| &incident.id == id)
    }

    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }
}

#[cfg(test)]
#[path = "tests/selection_tests.rs"]
mod tests;
