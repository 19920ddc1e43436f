//! Provisioner tests against temporary install/sbin/family directories.

use cs_common::{Config, Error, ServiceName};
use cs_core::catalog::{FamilyCatalog, InstalledCatalog};
use cs_core::provision::{ProvisionReport, Provisioner};
use std::fs;
use tempfile::TempDir;

struct Fixture {
    _dirs: Vec<TempDir>,
    config: Config,
}

fn fixture(families: &[&str]) -> Fixture {
    let init = tempfile::tempdir().unwrap();
    let sbin = tempfile::tempdir().unwrap();
    let family_dir = tempfile::tempdir().unwrap();
    let templates = tempfile::tempdir().unwrap();

    for family in families {
        fs::create_dir(family_dir.path().join(family)).unwrap();
    }
    let template = templates.path().join("csinit");
    fs::write(
        &template,
        "#!/bin/sh\nNAME={{ name }}\nPORT={{ port }}\n",
    )
    .unwrap();

    let mut config = Config::default();
    config.init_dir = init.path().to_path_buf();
    config.sbin_dir = sbin.path().to_path_buf();
    config.family_dir = family_dir.path().to_path_buf();
    config.template_path = template;
    Fixture {
        _dirs: vec![init, sbin, family_dir, templates],
        config,
    }
}

#[test]
fn add_single_writes_script_and_symlink() {
    let fx = fixture(&["task"]);
    let catalog = InstalledCatalog::new(&fx.config);
    let families = FamilyCatalog::new(&fx.config);
    let provisioner = Provisioner::new(&fx.config, &catalog, &families).without_step_delay();

    let report = provisioner
        .add_single(&ServiceName::new("cstask-1"))
        .unwrap();
    assert!(matches!(
        report,
        ProvisionReport::Created { ref name, port: None } if name.as_str() == "cstask-1"
    ));

    let script = fx.config.init_dir.join("cstask-1");
    let body = fs::read_to_string(&script).unwrap();
    assert!(body.contains("NAME=task"));
    assert!(body.contains("PORT=None"));
    assert!(fx.config.sbin_dir.join("cstask-1").is_symlink());

    use std::os::unix::fs::PermissionsExt;
    let mode = fs::metadata(&script).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o764);
}

#[test]
fn port_family_gets_a_rendered_port() {
    let fx = fixture(&["render"]);
    let catalog = InstalledCatalog::new(&fx.config);
    let families = FamilyCatalog::new(&fx.config);
    let provisioner = Provisioner::new(&fx.config, &catalog, &families).without_step_delay();

    let report = provisioner
        .add_single(&ServiceName::new("csrender-1"))
        .unwrap();
    let ProvisionReport::Created { port: Some(port), .. } = report else {
        panic!("expected a created report with a port, got {report:?}");
    };

    let body = fs::read_to_string(fx.config.init_dir.join("csrender-1")).unwrap();
    assert!(body.contains(&format!("PORT={port}")));
}

#[test]
fn add_single_refuses_duplicates() {
    let fx = fixture(&["task"]);
    let catalog = InstalledCatalog::new(&fx.config);
    let families = FamilyCatalog::new(&fx.config);
    let provisioner = Provisioner::new(&fx.config, &catalog, &families).without_step_delay();

    provisioner
        .add_single(&ServiceName::new("cstask-1"))
        .unwrap();
    let err = provisioner
        .add_single(&ServiceName::new("cstask-1"))
        .unwrap_err();
    assert!(matches!(err, Error::Duplicate(_)));
}

#[test]
fn add_single_rejects_unknown_family() {
    let fx = fixture(&["task"]);
    let catalog = InstalledCatalog::new(&fx.config);
    let families = FamilyCatalog::new(&fx.config);
    let provisioner = Provisioner::new(&fx.config, &catalog, &families).without_step_delay();

    let err = provisioner
        .add_single(&ServiceName::new("csweb-1"))
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn add_range_creates_and_skips_existing() {
    let fx = fixture(&["task"]);
    let catalog = InstalledCatalog::new(&fx.config);
    let families = FamilyCatalog::new(&fx.config);
    let provisioner = Provisioner::new(&fx.config, &catalog, &families).without_step_delay();

    fs::write(fx.config.init_dir.join("cstask-4"), "existing").unwrap();

    let reports = provisioner
        .add_range(&ServiceName::new("cstask"), "3-5")
        .unwrap();
    assert_eq!(reports.len(), 3);
    assert!(matches!(&reports[0], ProvisionReport::Created { name, .. } if name.as_str() == "cstask-3"));
    assert!(
        matches!(&reports[1], ProvisionReport::SkippedExisting(name) if name.as_str() == "cstask-4")
    );
    assert!(matches!(&reports[2], ProvisionReport::Created { name, .. } if name.as_str() == "cstask-5"));

    // The existing script is untouched.
    assert_eq!(
        fs::read_to_string(fx.config.init_dir.join("cstask-4")).unwrap(),
        "existing"
    );
}

#[test]
fn brain_range_keeps_the_given_stem() {
    let fx = fixture(&["brain"]);
    let catalog = InstalledCatalog::new(&fx.config);
    let families = FamilyCatalog::new(&fx.config);
    let provisioner = Provisioner::new(&fx.config, &catalog, &families).without_step_delay();

    let reports = provisioner
        .add_range(&ServiceName::new("csbrainstem"), "1-2")
        .unwrap();
    let names: Vec<&str> = reports
        .iter()
        .map(|r| match r {
            ProvisionReport::Created { name, .. } => name.as_str(),
            other => panic!("unexpected report {other:?}"),
        })
        .collect();
    assert_eq!(names, vec!["csbrainstem-1", "csbrainstem-2"]);
}

#[test]
fn brain_range_requires_a_listed_family() {
    let fx = fixture(&["task"]);
    let catalog = InstalledCatalog::new(&fx.config);
    let families = FamilyCatalog::new(&fx.config);
    let provisioner = Provisioner::new(&fx.config, &catalog, &families).without_step_delay();

    let err = provisioner
        .add_range(&ServiceName::new("csbrainstem"), "1-2")
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn remove_range_reports_missing_and_continues() {
    let fx = fixture(&["task"]);
    let catalog = InstalledCatalog::new(&fx.config);
    let families = FamilyCatalog::new(&fx.config);
    let provisioner = Provisioner::new(&fx.config, &catalog, &families).without_step_delay();

    provisioner
        .add_range(&ServiceName::new("cstask"), "1-3")
        .unwrap();
    fs::remove_file(fx.config.init_dir.join("cstask-2")).unwrap();

    let reports = provisioner
        .remove_range(&ServiceName::new("cstask"), "1-3")
        .unwrap();
    assert_eq!(reports.len(), 3);
    assert!(matches!(&reports[0], ProvisionReport::Removed(name) if name.as_str() == "cstask-1"));
    assert!(matches!(&reports[1], ProvisionReport::NotFound(name) if name.as_str() == "cstask-2"));
    assert!(matches!(&reports[2], ProvisionReport::Removed(name) if name.as_str() == "cstask-3"));

    assert!(!fx.config.init_dir.join("cstask-1").exists());
    assert!(!fx.config.sbin_dir.join("cstask-1").is_symlink());
}

#[test]
fn remove_single_missing_is_reported_not_an_error() {
    let fx = fixture(&["task"]);
    let catalog = InstalledCatalog::new(&fx.config);
    let families = FamilyCatalog::new(&fx.config);
    let provisioner = Provisioner::new(&fx.config, &catalog, &families).without_step_delay();

    let report = provisioner
        .remove_single(&ServiceName::new("cstask-9"))
        .unwrap();
    assert!(matches!(report, ProvisionReport::NotFound(_)));
}
