use crate::error::StoreError;
use crate::ports::KvStore;
use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};

/// Maximum persisted command payload (§4.6: "1024 bytes including terminator").
const MAX_VALUE_LEN: usize = 1024;

pub struct EspidfKvStore {
    nvs: EspNvs<NvsDefault>,
}

impl EspidfKvStore {
    pub fn new(partition: EspNvsPartition<NvsDefault>, namespace: &str) -> Result<Self, StoreError> {
        let nvs = EspNvs::new(partition, namespace, true)
            .map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self { nvs })
    }
}

impl KvStore for EspidfKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut buf = vec![0u8; MAX_VALUE_LEN];
        match self.nvs.get_raw(key, &mut buf) {
            Ok(Some(slice)) => Ok(Some(slice.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::OpenFailed(e.to_string())),
        }
    }

    fn set(&mut self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        if data.len() > MAX_VALUE_LEN {
            return Err(StoreError::WriteFailed("payload exceeds 1024 bytes".to_string()));
        }
        self.nvs.set_raw(key, data).map_err(|e| StoreError::WriteFailed(e.to_string()))
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        // EspNvs writes are committed synchronously by the ESP-IDF NVS
        // driver; nothing further is required here.
        Ok(())
    }
}
