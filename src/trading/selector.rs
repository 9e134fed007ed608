//! Chooses which tracked instruments may hold a position today.

use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use super::SelectionConfig;

/// Daily instrument selection.
///
/// With `open_all` every tracked instrument is tradable. Otherwise one
/// instrument is drawn at random and kept until the date changes.
#[derive(Debug, Clone)]
pub struct InstrumentSelector {
    instruments: Vec<String>,
    open_all: bool,
    daily: Option<(NaiveDate, String)>,
}

impl InstrumentSelector {
    pub fn new(config: &SelectionConfig) -> Self {
        Self {
            instruments: config.instruments.clone(),
            open_all: config.open_all,
            daily: None,
        }
    }

    /// All instruments evaluated each tick.
    pub fn tracked(&self) -> &[String] {
        &self.instruments
    }

    /// Instruments allowed to hold a position on `today`.
    pub fn selection<R: Rng + ?Sized>(&mut self, today: NaiveDate, rng: &mut R) -> Vec<String> {
        if self.open_all {
            return self.instruments.clone();
        }

        let stale = self.daily.as_ref().map_or(true, |(date, _)| *date != today);
        if stale {
            if let Some(choice) = self.instruments.choose(rng) {
                info!(instrument = %choice, date = %today, "Selected trading instrument for the day");
                self.daily = Some((today, choice.clone()));
            }
        }

        self.daily
            .as_ref()
            .map(|(_, instrument)| vec![instrument.clone()])
            .unwrap_or_default()
    }
}
