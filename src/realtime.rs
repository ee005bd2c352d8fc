// src/realtime.rs

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::client::ParkClient;
use crate::error::ParkError;
use crate::plot::Plot;
use crate::query::PlotQuery;

const CHANNEL_CAPACITY: usize = 64;

/// A change to the plot table observed between two snapshots.
#[derive(Debug, Clone, PartialEq)]
pub enum PlotChange {
    Inserted(Plot),
    Updated { old: Plot, new: Plot },
    Deleted(Plot),
}

impl PlotChange {
    pub fn plot_id(&self) -> &str {
        match self {
            PlotChange::Inserted(plot) | PlotChange::Deleted(plot) => &plot.id,
            PlotChange::Updated { new, .. } => &new.id,
        }
    }
}

/// Compares two listings keyed by plot id.
///
/// Inserts and updates come first in the order of `new`, followed by deletions
/// in the order of `old`. Rows that compare equal produce nothing.
pub fn diff_snapshots(old: &[Plot], new: &[Plot]) -> Vec<PlotChange> {
    let old_by_id: HashMap<&str, &Plot> = old.iter().map(|p| (p.id.as_str(), p)).collect();
    let new_by_id: HashMap<&str, &Plot> = new.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut changes = Vec::new();
    for plot in new {
        match old_by_id.get(plot.id.as_str()) {
            None => changes.push(PlotChange::Inserted(plot.clone())),
            Some(previous) if *previous != plot => changes.push(PlotChange::Updated {
                old: (*previous).clone(),
                new: plot.clone(),
            }),
            Some(_) => {}
        }
    }
    for plot in old {
        if !new_by_id.contains_key(plot.id.as_str()) {
            changes.push(PlotChange::Deleted(plot.clone()));
        }
    }
    changes
}

/// Live feed of [`PlotChange`]s. The background task stops when this is dropped.
#[derive(Debug)]
pub struct PlotSubscription {
    receiver: mpsc::Receiver<PlotChange>,
    task: JoinHandle<()>,
}

impl PlotSubscription {
    /// Waits for the next change. `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<PlotChange> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<PlotChange> {
        self.receiver.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for PlotSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl ParkClient {
    /// Subscribes to changes of the plots matching `query`.
    ///
    /// The current listing is fetched immediately (errors are returned here) and then
    /// re-fetched every `interval`; differences are delivered as [`PlotChange`]s. A failed
    /// poll is logged and the previous snapshot kept. The task uses a clone of this client,
    /// so it keeps the session that was active when subscribing. Once that session expires
    /// the polls continue with the API key and only see publicly readable rows.
    pub async fn subscribe_plots(
        &self,
        query: PlotQuery,
        interval: Duration,
    ) -> Result<PlotSubscription, ParkError> {
        if interval.is_zero() {
            return Err(ParkError::InvalidInput(
                "subscription interval must be greater than zero".to_string(),
            ));
        }

        let mut snapshot = self.list_plots(&query).await?;
        let client = self.clone();
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let latest = match client.list_plots(&query).await {
                    Ok(plots) => plots,
                    Err(e) => {
                        log::warn!("Plot subscription poll failed: {}", e);
                        continue;
                    }
                };

                let changes = diff_snapshots(&snapshot, &latest);
                if !changes.is_empty() {
                    log::debug!("Plot subscription observed {} change(s)", changes.len());
                }
                for change in changes {
                    if sender.send(change).await.is_err() {
                        log::debug!("Plot subscription receiver dropped, stopping");
                        return;
                    }
                }
                snapshot = latest;
            }
        });

        Ok(PlotSubscription { receiver, task })
    }
}
