use std::path::Path;

use anyhow::bail;

use stepscale_core::WorkloadKey;
use stepscale_state::StateStore;

pub fn list(path: &Path) -> anyhow::Result<()> {
    let store = StateStore::open(path)?;
    for record in store.list_records()? {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

pub fn delete(path: &Path, workload: &str) -> anyhow::Result<()> {
    let Some(key) = WorkloadKey::parse(workload) else {
        bail!("workload must be namespace/name, got {workload:?}");
    };
    let store = StateStore::open(path)?;
    if store.delete_record(&key.table_key())? {
        eprintln!("✓ Deleted {key}");
    } else {
        eprintln!("No record for {key}");
    }
    Ok(())
}
