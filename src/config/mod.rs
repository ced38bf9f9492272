use anyhow::Result;
use chrono::NaiveDate;
use log::debug;
use serde::Deserialize;

use crate::pay_period::PayCalendar;

/// Environment-driven settings. A `.env` file in the working directory is
/// honored, which is how local setups usually provide these.
#[derive(Deserialize, Debug)]
pub struct Config {
    database_url: String,
    /// Where workflow notifications are posted. Unset disables delivery.
    #[serde(default)]
    webhook_url: Option<String>,
    /// Overrides the built-in pay period anchor date, ISO format.
    #[serde(default)]
    pay_period_anchor: Option<NaiveDate>,
}

impl Config {
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url.as_deref()
    }

    pub fn pay_calendar(&self) -> PayCalendar {
        match self.pay_period_anchor {
            Some(anchor) => PayCalendar::new(anchor),
            None => PayCalendar::default(),
        }
    }
}

pub fn init() -> Result<Config> {
    dotenvy::dotenv().ok();
    let config = envy::from_env::<Config>()?;
    debug!(
        "pay periods anchored at {}",
        config.pay_calendar().anchor()
    );
    Ok(config)
}
