//! Checkpoint log and rig file on disk.

use manifold_rig::file::FileFormat;
use manifold_rig::prelude::*;
use manifold_test_helpers::prelude::*;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

fn checkpoint(pressure: u64, fluid_remaining_secs: f64) -> Checkpoint {
    Checkpoint {
        timestamp: 1_767_225_600.5,
        pressure_count: pressure,
        fluid_count: 5,
        fluid_remaining_secs,
        chamber_count: 7,
        chamber_remaining_secs: 12.345_678_9,
    }
}

#[test]
fn test_checkpoints_append_and_reload_losslessly() -> TestResult {
    let dir = tempfile::tempdir()?;
    let store = JsonLinesCheckpointStore::new(dir.path().join("runs").join("checkpoints.jsonl"));
    assert_eq!(store.latest()?, None);

    let first = checkpoint(10, 3600.0);
    let second = checkpoint(11, 0.1 + 0.2);
    store.save(&first)?;
    store.save(&second)?;

    assert_eq!(store.read_all()?, vec![first, second.clone()]);
    assert_eq!(store.latest()?, Some(second));
    Ok(())
}

#[test]
fn test_reopened_store_sees_previous_runs() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("checkpoints.jsonl");
    JsonLinesCheckpointStore::new(&path).save(&checkpoint(1, 1.0))?;

    let reopened = JsonLinesCheckpointStore::new(&path);
    reopened.save(&checkpoint(2, 2.0))?;
    let counts: Vec<u64> = reopened.read_all()?.iter().map(|c| c.pressure_count).collect();
    assert_eq!(counts, vec![1, 2]);
    Ok(())
}

#[test]
fn test_corrupt_line_is_reported_with_its_number() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("checkpoints.jsonl");
    let store = JsonLinesCheckpointStore::new(&path);
    store.save(&checkpoint(1, 1.0))?;
    fs::write(
        &path,
        format!("{}\n{{\"pressure_count\":\n", fs::read_to_string(&path)?.trim_end()),
    )?;

    let err = store.read_all().err().ok_or("corrupt log accepted")?;
    assert!(matches!(&err, RigError::Persistence { reason, .. } if reason.starts_with("line 2:")));
    Ok(())
}

#[test]
fn test_rig_run_writes_to_checkpoint_log() -> TestResult {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(JsonLinesCheckpointStore::new(
        dir.path().join("checkpoints.jsonl"),
    ));
    let devices = RigDevices {
        pumps: vec![Arc::new(SimulatedPump::new("pump:bcm")) as Arc<dyn PumpActuator>],
        daq: Arc::new(SimulatedDaq::new("daq")),
        fluid_bath: Some(Arc::new(SimulatedBath::new("bath:fluid"))),
        chamber_bath: Some(Arc::new(SimulatedBath::new("bath:chamber"))),
    };
    let rig = TestOrchestrator::new(
        RigConfig::default(),
        devices,
        Arc::clone(&store) as Arc<dyn CheckpointStore>,
    )?;
    rig.generate_profile(TestProfile::default(), None)?;

    let written = rig.checkpoint()?;
    assert_eq!(store.latest()?, Some(written));
    Ok(())
}

#[test]
fn test_rig_file_yaml_round_trip() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rig.yaml");

    let mut file = RigFile::default();
    file.rig.time_unit = Duration::from_millis(250);
    file.rig.autosave_interval = None;
    file.profile.chamber = None;
    file.checkpoint_path = dir.path().join("checkpoints.jsonl");
    file.save_to_path(&path)?;

    let text = fs::read_to_string(&path)?;
    assert!(text.contains("time_unit_secs: 0.25"));
    assert!(text.contains("chamber: null"));
    assert_eq!(RigFile::load_from_path(&path)?, file);
    Ok(())
}

#[test]
fn test_rig_file_json_is_validated_separately() -> TestResult {
    let json = r#"{ "profile": { "fluid": { "period": -1.0, "min": 0.0, "max": 30.0 } } }"#;
    let file = RigFile::parse(json, FileFormat::Json)?;

    let err = file.validate().err().ok_or("negative period accepted")?;
    insta::assert_snapshot!(err, @"Invalid configuration for 'fluid.period': must be greater than 0, got -1");
    Ok(())
}
