// src/state.rs

use std::collections::BTreeSet;

use crate::error::ParkError;
use crate::plot::Plot;
use crate::realtime::PlotChange;
use crate::search::PlotFilter;
use crate::status::PlotStatus;

/// Everything the map screen needs besides rendering: loaded plots, the selected
/// plot, favorites and the active filter. Mutated only through [`MapState::dispatch`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapState {
    plots: Vec<Plot>,
    selected: Option<String>,
    favorites: BTreeSet<String>,
    filter: PlotFilter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetPlots(Vec<Plot>),
    Upsert(Plot),
    Remove(String),
    Apply(PlotChange),
    Select(String),
    ClearSelection,
    ToggleFavorite(String),
    SetSearch(String),
    SetStatusFilter(Option<PlotStatus>),
}

impl MapState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&mut self, action: Action) {
        match action {
            Action::SetPlots(plots) => {
                self.plots = plots;
                self.drop_dangling_selection();
            }
            Action::Upsert(plot) => self.upsert(plot),
            Action::Remove(id) => self.remove(&id),
            Action::Apply(change) => match change {
                PlotChange::Inserted(plot) | PlotChange::Updated { new: plot, .. } => {
                    self.upsert(plot)
                }
                PlotChange::Deleted(plot) => self.remove(&plot.id),
            },
            Action::Select(id) => {
                // Selecting an unknown id is ignored.
                if self.plot(&id).is_some() {
                    self.selected = Some(id);
                }
            }
            Action::ClearSelection => self.selected = None,
            Action::ToggleFavorite(id) => {
                if !self.favorites.remove(&id) {
                    self.favorites.insert(id);
                }
            }
            Action::SetSearch(text) => self.filter.text = text,
            Action::SetStatusFilter(status) => self.filter.status = status,
        }
    }

    fn upsert(&mut self, plot: Plot) {
        match self.plots.iter_mut().find(|p| p.id == plot.id) {
            Some(existing) => *existing = plot,
            None => self.plots.push(plot),
        }
    }

    fn remove(&mut self, id: &str) {
        self.plots.retain(|p| p.id != id);
        self.drop_dangling_selection();
    }

    fn drop_dangling_selection(&mut self) {
        if let Some(id) = &self.selected {
            if !self.plots.iter().any(|p| &p.id == id) {
                self.selected = None;
            }
        }
    }

    pub fn plots(&self) -> &[Plot] {
        &self.plots
    }

    pub fn plot(&self, id: &str) -> Option<&Plot> {
        self.plots.iter().find(|p| p.id == id)
    }

    pub fn filter(&self) -> &PlotFilter {
        &self.filter
    }

    pub fn selected_plot(&self) -> Option<&Plot> {
        self.selected.as_deref().and_then(|id| self.plot(id))
    }

    /// Plots passing the current search text and status filter.
    pub fn visible_plots(&self) -> Vec<&Plot> {
        crate::search::filter_plots(&self.plots, &self.filter)
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.favorites.contains(id)
    }

    /// Loaded plots that are favorites, in listing order. Favorites whose plot is
    /// not loaded are kept but not returned.
    pub fn favorite_plots(&self) -> Vec<&Plot> {
        self.plots
            .iter()
            .filter(|p| self.favorites.contains(&p.id))
            .collect()
    }

    /// Favorites as a JSON array of ids, for local storage.
    pub fn favorites_to_json(&self) -> Result<String, ParkError> {
        Ok(serde_json::to_string(&self.favorites)?)
    }

    /// Replaces the favorites from a JSON array of ids.
    pub fn favorites_from_json(&mut self, json: &str) -> Result<(), ParkError> {
        self.favorites = serde_json::from_str(json)?;
        Ok(())
    }
}
