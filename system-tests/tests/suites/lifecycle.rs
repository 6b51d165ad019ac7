// system-tests/tests/suites/lifecycle.rs
// ============================================================================
// Module: Namespace Lifecycle Suite
// Description: Create, use, and remove namespaces on a real MariaDB server.
// Purpose: Validate isolation, authorization, and cleanup end to end.
// Dependencies: system-tests helpers, db-isolation-core
// ============================================================================

//! Namespace lifecycle scenarios against a real MariaDB server.

use std::thread;

use db_isolation_core::Deadline;
use db_isolation_core::DriverError;
use db_isolation_core::IsolationError;
use db_isolation_core::Namespace;
use db_isolation_core::NamespaceState;
use helpers::campaign::CampaignFixture;

use crate::helpers;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn namespace_round_trip_then_gone() -> TestResult {
    let mut fixture = CampaignFixture::start()?;
    let namespace = fixture.manager.create_database(&Deadline::none())?;
    {
        let mut conn = fixture.manager.connect(&Deadline::none())?;
        conn.execute("CREATE TABLE t (id INT)")?;
        conn.execute("INSERT INTO t VALUES (1)")?;
        let rows = conn.query("SELECT id FROM t")?;
        if rows != vec![vec![Some("1".to_string())]] {
            return Err(format!("unexpected rows {rows:?}").into());
        }
        conn.close()?;
    }

    fixture.manager.remove_database(&Deadline::none());
    if fixture.manager.state() != NamespaceState::Empty {
        return Err("slot should be empty after removal".into());
    }
    if fixture.database_exists(namespace.as_str())? {
        return Err(format!("{namespace} still exists after removal").into());
    }
    match fixture.factory().scoped_connection(fixture.manager.server(), &namespace, &Deadline::none())
    {
        Err(DriverError::UnknownDatabase(_)) => Ok(()),
        Err(other) => Err(format!("expected unknown database, got {other}").into()),
        Ok(_) => Err("connected to a removed namespace".into()),
    }
}

#[test]
fn concurrent_siblings_do_not_see_each_other() -> TestResult {
    let fixture = CampaignFixture::start()?;
    let workers: Vec<_> = (0..4)
        .map(|index| {
            let mut manager = fixture.manager.sibling();
            thread::spawn(move || -> Result<(String, Vec<String>), String> {
                let namespace =
                    manager.create_database(&Deadline::none()).map_err(|err| err.to_string())?;
                let mut conn = manager.connect(&Deadline::none()).map_err(|err| err.to_string())?;
                conn.execute("CREATE TABLE t (label VARCHAR(32))").map_err(|err| err.to_string())?;
                conn.execute(&format!("INSERT INTO t VALUES ('worker-{index}')"))
                    .map_err(|err| err.to_string())?;
                let labels = conn
                    .query("SELECT label FROM t")
                    .map_err(|err| err.to_string())?
                    .into_iter()
                    .filter_map(|row| row.into_iter().next().flatten())
                    .collect();
                drop(conn);
                manager.remove_database(&Deadline::none());
                Ok((namespace.as_str().to_string(), labels))
            })
        })
        .collect();

    let mut names = Vec::new();
    for (index, worker) in workers.into_iter().enumerate() {
        let (name, labels) = worker.join().map_err(|_| "worker panicked")??;
        if labels != vec![format!("worker-{index}")] {
            return Err(format!("worker {index} saw {labels:?}").into());
        }
        names.push(name);
    }
    names.sort();
    names.dedup();
    if names.len() != 4 {
        return Err(format!("namespace names collided: {names:?}").into());
    }
    Ok(())
}

#[test]
fn ungranted_namespace_is_refused() -> TestResult {
    let fixture = CampaignFixture::start()?;
    let stranger = Namespace::generate("")?;
    match fixture.factory().scoped_connection(fixture.manager.server(), &stranger, &Deadline::none())
    {
        Err(DriverError::AccessDenied(_)) => Ok(()),
        Err(other) => Err(format!("expected access denied, got {other}").into()),
        Ok(_) => Err("connected to a namespace that was never granted".into()),
    }
}

#[test]
fn removing_twice_is_harmless() -> TestResult {
    let mut fixture = CampaignFixture::start()?;
    fixture.manager.create_database(&Deadline::none())?;
    fixture.manager.remove_database(&Deadline::none());
    fixture.manager.remove_database(&Deadline::none());
    if !fixture.diagnostics.cleanup_failures().is_empty() {
        return Err(format!("unexpected cleanup failures {:?}", fixture.diagnostics.cleanup_failures())
            .into());
    }
    Ok(())
}

#[test]
fn provisioning_releases_admin_connections() -> TestResult {
    let mut fixture = CampaignFixture::start()?;
    let before = fixture.admin_sessions()?;
    fixture.manager.create_database(&Deadline::none())?;
    fixture.manager.remove_database(&Deadline::none());
    let after = fixture.admin_sessions()?;
    if after > before {
        return Err(format!("admin sessions grew from {before} to {after}").into());
    }
    Ok(())
}

#[test]
fn failed_grant_is_reported_and_reclaimed() -> TestResult {
    let fixture = CampaignFixture::start()?;
    let mut ghost = fixture.with_unknown_user("ghost_user");
    match ghost.create_database(&Deadline::none()) {
        Err(IsolationError::Provisioning(_)) => {}
        Err(other) => return Err(format!("expected provisioning failure, got {other}").into()),
        Ok(namespace) => return Err(format!("granted {namespace} to a missing account").into()),
    }
    if ghost.state() != NamespaceState::Failed {
        return Err(format!("expected failed slot, got {:?}", ghost.state()).into());
    }
    let created = fixture
        .diagnostics
        .events()
        .into_iter()
        .find(|event| event.event == "namespace_create_failed")
        .and_then(|event| event.namespace)
        .ok_or("create failure event missing its namespace")?;
    if !fixture.database_exists(&created)? {
        return Err(format!("{created} should exist until removed").into());
    }

    ghost.remove_database(&Deadline::none());
    if fixture.database_exists(&created)? {
        return Err(format!("{created} survived removal").into());
    }
    Ok(())
}
