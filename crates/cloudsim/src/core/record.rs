//! Reporting records of finished cloudlets.

use std::path::Path;

use serde::Serialize;

use cloudsim_core::Id;

use crate::core::cloudlet::Cloudlet;
use crate::core::error::CloudError;

/// Flat view of a returned cloudlet.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CloudletRecord {
    pub id: u32,
    pub status: String,
    pub datacenter_id: Option<Id>,
    pub vm_id: Option<u32>,
    pub actual_cpu_time: f64,
    pub exec_start_time: Option<f64>,
    pub finish_time: Option<f64>,
    pub cost: f64,
}

impl From<&Cloudlet> for CloudletRecord {
    fn from(cloudlet: &Cloudlet) -> Self {
        Self {
            id: cloudlet.id,
            status: cloudlet.status().to_string(),
            datacenter_id: cloudlet.datacenter_id(),
            vm_id: cloudlet.vm_id(),
            actual_cpu_time: cloudlet.actual_cpu_time(),
            exec_start_time: cloudlet.exec_start_time(),
            finish_time: cloudlet.finish_time(),
            cost: cloudlet.cost(),
        }
    }
}

/// Writes records to CSV file with a header row.
pub fn save_records_csv<P: AsRef<Path>>(path: P, records: &[CloudletRecord]) -> Result<(), CloudError> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| CloudError::Config(format!("can't create {}: {}", path.display(), e)))?;
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| CloudError::Config(format!("can't write {}: {}", path.display(), e)))?;
    }
    writer
        .flush()
        .map_err(|e| CloudError::Config(format!("can't write {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_of_unfinished_cloudlet() {
        let cloudlet = Cloudlet::new(4, 1000., 1, 0, 0).with_vm(2);
        let record = CloudletRecord::from(&cloudlet);
        assert_eq!(record.status, "CREATED");
        assert_eq!(record.vm_id, Some(2));
        assert_eq!(record.finish_time, None);
        assert_eq!(record.actual_cpu_time, 0.);
    }

    #[test]
    fn test_save_csv() {
        let path = std::env::temp_dir().join(format!("cloudsim-records-{}.csv", std::process::id()));
        let records = vec![CloudletRecord::from(&Cloudlet::new(0, 1000., 1, 0, 0))];
        save_records_csv(&path, &records).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("id,status,datacenter_id,vm_id,actual_cpu_time,exec_start_time,finish_time,cost")
        );
        assert!(lines.next().unwrap().starts_with("0,CREATED,,,"));
    }
}
