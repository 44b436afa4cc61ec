use crate::error::SntpError;
use crate::ports::SntpPort;
use esp_idf_svc::sntp::{EspSntp, SyncStatus};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct EspidfSntp {
    client: Option<EspSntp<'static>>,
}

impl EspidfSntp {
    pub fn new() -> Self { Self { client: None } }
}

impl Default for EspidfSntp {
    fn default() -> Self { Self::new() }
}

impl SntpPort for EspidfSntp {
    fn start(&mut self, on_sync: Box<dyn Fn() + Send>) -> Result<(), SntpError> {
        let sntp = EspSntp::new_default().map_err(|e| SntpError::SpawnFailed(e.to_string()))?;
        if sntp.get_sync_status() == SyncStatus::Completed {
            on_sync();
        }
        self.client = Some(sntp);
        Ok(())
    }

    fn now_unix_s(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
    }
}
