//! Disposable Postgres instances for integration tests.
//!
//! Prefers an externally supplied server via `VITRINE_TEST_DATABASE_URL`
//! (each test still gets its own database); otherwise spawns a throwaway
//! server from locally installed Postgres binaries. Tests decide whether to
//! skip when neither is available.

use std::fs;
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use postgres::NoTls;
use url::Url;

/// Handle to a disposable Postgres database used in tests.
///
/// Dropping the handle removes the database and, when a local server was
/// spawned, tears the server down with its data directory.
pub struct TestDatabase {
    connection_string: String,
    admin_url: String,
    database: String,
    server: Option<LocalServer>,
}

struct LocalServer {
    process: Child,
    data_dir: PathBuf,
}

impl TestDatabase {
    /// Connection string that can be passed to `sqlx` or other Postgres
    /// clients.
    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        let _ = run_admin_statement(
            &self.admin_url,
            &format!("DROP DATABASE IF EXISTS \"{}\"", self.database),
        );
        if let Some(server) = &mut self.server {
            let _ = server.process.kill();
            let _ = server.process.wait();
            let _ = fs::remove_dir_all(&server.data_dir);
        }
    }
}

/// Start a disposable Postgres database, preferring an external server.
///
/// # Errors
///
/// Returns an error if no external URL is provided and Postgres binaries
/// are unavailable or fail to start.
pub fn start_postgres() -> Result<TestDatabase> {
    if let Ok(base_url) = std::env::var("VITRINE_TEST_DATABASE_URL") {
        return provision_database(&base_url, None);
    }

    let server = spawn_local_server()?;
    let base_url = format!(
        "postgres://postgres@127.0.0.1:{}/postgres",
        server.port
    );
    provision_database(&base_url, Some(server.handle))
}

struct SpawnedServer {
    handle: LocalServer,
    port: u16,
}

fn spawn_local_server() -> Result<SpawnedServer> {
    let initdb = find_binary("initdb")?;
    let postgres_bin = find_binary("postgres")?;
    let pg_isready = find_binary("pg_isready")?;

    let port = free_port()?;
    let data_dir = fresh_data_dir()?;
    let data_dir_str = data_dir
        .to_str()
        .context("data dir contains non-utf8 characters")?;

    let status = Command::new(initdb)
        .args(["-D", data_dir_str, "--username=postgres", "--auth=trust"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .context("failed to run initdb")?;
    if !status.success() {
        bail!("initdb exited with failure status");
    }

    let process = Command::new(postgres_bin)
        .args(["-D", data_dir_str, "-p", &port.to_string(), "-h", "127.0.0.1"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("failed to start postgres process")?;

    let ready = (0..30).any(|_| {
        let probe = Command::new(&pg_isready)
            .args(["-h", "127.0.0.1", "-p", &port.to_string(), "-U", "postgres"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if matches!(probe, Ok(ref s) if s.success()) {
            return true;
        }
        thread::sleep(Duration::from_millis(200));
        false
    });
    if !ready {
        bail!("postgres process did not become ready in time");
    }

    Ok(SpawnedServer {
        handle: LocalServer { process, data_dir },
        port,
    })
}

fn provision_database(base_url: &str, server: Option<LocalServer>) -> Result<TestDatabase> {
    let parsed = Url::parse(base_url).context("invalid postgres connection url")?;

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let database = format!("vitrine_test_{}_{nanos}", std::process::id());

    let mut admin = parsed.clone();
    admin.set_path("/postgres");
    let admin_url = admin.to_string();

    // Fall back to the supplied database when the `postgres` maintenance
    // database is not connectable.
    run_admin_statement(&admin_url, &format!("CREATE DATABASE \"{database}\""))
        .or_else(|_| {
            run_admin_statement(base_url, &format!("CREATE DATABASE \"{database}\""))
        })?;

    let mut database_url = parsed;
    database_url.set_path(&format!("/{database}"));

    Ok(TestDatabase {
        connection_string: database_url.to_string(),
        admin_url,
        database,
        server,
    })
}

fn run_admin_statement(url: &str, statement: &str) -> Result<()> {
    let url = url.to_string();
    let statement = statement.to_string();
    thread::spawn(move || -> Result<()> {
        let config = postgres::Config::from_str(&url)?;
        let mut client = config.connect(NoTls)?;
        client
            .simple_query(&statement)
            .map(|_| ())
            .with_context(|| format!("failed to execute '{statement}'"))
    })
    .join()
    .unwrap_or_else(|_| Err(anyhow::anyhow!("admin statement thread panicked")))
}

fn find_binary(name: &str) -> Result<PathBuf> {
    let mut search_paths: Vec<PathBuf> = std::env::var_os("PATH")
        .map_or_else(Vec::new, |paths| std::env::split_paths(&paths).collect());
    // Common server-install locations that are not always on PATH.
    search_paths.extend(
        [
            "/usr/lib/postgresql/16/bin",
            "/usr/local/bin",
            "/opt/homebrew/opt/postgresql@16/bin",
            "/opt/homebrew/bin",
        ]
        .map(PathBuf::from),
    );

    search_paths
        .into_iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.exists())
        .with_context(|| format!("{name} binary is required for Postgres tests"))
}

fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("failed to reserve port")?;
    let port = listener
        .local_addr()
        .context("failed to read listener address")?
        .port();
    drop(listener);
    Ok(port)
}

fn fresh_data_dir() -> Result<PathBuf> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = PathBuf::from(".server_root/postgres").join(format!(
        "vitrine-pg-{}-{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create data dir {}", dir.display()))?;
    Ok(dir)
}
