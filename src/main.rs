use std::sync::Arc;

use atelier_inbox::classifier::{BoundedClassifier, EmailClassifier, RemoteClassifier};
use atelier_inbox::config::AppConfig;
use atelier_inbox::notify::{
    Mailer, NotificationDispatcher, SmtpMailer, spawn_notification_worker,
};
use atelier_inbox::pipeline::processor::EmailProcessor;
use atelier_inbox::records::RecordInserter;
use atelier_inbox::security::SecurityScanner;
use atelier_inbox::server;
use atelier_inbox::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    eprintln!("📬 Atelier Inbox v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Webhook: http://0.0.0.0:{}/webhook/email", config.port);
    eprintln!("   API: http://0.0.0.0:{}/api/integrations", config.port);

    // ── Database ─────────────────────────────────────────────────────
    let db_path = std::path::Path::new(&config.db_path);
    let backend = Arc::new(LibSqlBackend::new_local(db_path).await.unwrap_or_else(|e| {
        eprintln!("Error: Failed to open database at {}: {}", config.db_path, e);
        std::process::exit(1);
    }));
    // Two views of the same backend: full access for the server and log,
    // insert-only for record creation.
    let db: Arc<dyn Database> = backend.clone();
    let inserter: Arc<dyn RecordInserter> = backend.clone();
    eprintln!("   Database: {}", config.db_path);

    // ── Security scanner ─────────────────────────────────────────────
    let scanner = match &config.security_patterns_path {
        Some(path) => {
            eprintln!("   Security patterns: {path}");
            SecurityScanner::from_json_file(std::path::Path::new(path))?
        }
        None => SecurityScanner::with_default_patterns(),
    };

    // ── Classifier ───────────────────────────────────────────────────
    let classifier = match &config.classifier {
        Some(cfg) => {
            eprintln!("   Classifier: {} (timeout {:?})", cfg.base_url, cfg.timeout);
            let remote = RemoteClassifier::new(cfg);
            EmailClassifier::new(Some(BoundedClassifier::new(
                Arc::new(remote),
                cfg.timeout,
            )))
        }
        None => {
            eprintln!("   Classifier: heuristics only");
            EmailClassifier::heuristics_only()
        }
    };

    // ── Notifications ────────────────────────────────────────────────
    let mailer: Option<Arc<dyn Mailer>> = config.smtp.as_ref().map(|smtp| {
        eprintln!("   SMTP: {}:{}", smtp.host, smtp.port);
        Arc::new(SmtpMailer::new(smtp.clone())) as Arc<dyn Mailer>
    });
    let dispatcher = NotificationDispatcher::new(Arc::clone(&db), mailer.clone());

    let _notify_worker = mailer.map(|mailer| {
        spawn_notification_worker(Arc::clone(&db), mailer, config.notify_interval)
    });

    // ── Pipeline + server ────────────────────────────────────────────
    let processor = Arc::new(EmailProcessor::new(
        Arc::clone(&db),
        inserter,
        scanner,
        classifier,
        dispatcher,
    ));

    let app = server::routes(db, processor);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "server started");
    axum::serve(listener, app).await?;

    Ok(())
}
