//! End-to-end checks of the expiry monitor

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use domain_expiry::{
    config::Config,
    events::{CollectingSink, QueryEvent},
    limiter::VirtualClock,
    report, DomainEntry, ExpiryMonitor, TcpWhoisTransport, UrgencyClass, WhoisError, WhoisTransport,
};
use std::{collections::HashMap, sync::Arc};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpListener,
};

struct StubTransport {
    replies: HashMap<&'static str, &'static str>,
}

#[async_trait]
impl WhoisTransport for StubTransport {
    async fn query(&self, domain: &str) -> Result<String, WhoisError> {
        match self.replies.get(domain) {
            Some(reply) => Ok(reply.to_string()),
            None => Err(WhoisError::Timeout),
        }
    }
}

fn entries(domains: &[&str]) -> Vec<DomainEntry> {
    domains.iter().map(|d| DomainEntry::new(*d)).collect()
}

#[tokio::test]
async fn test_batch_keeps_good_domains_in_order() {
    let transport = Arc::new(StubTransport {
        replies: HashMap::from([
            ("good.example", "Registrar: GANDI SAS\nRegistry Expiry Date: 2030-01-01T00:00:00Z\n"),
            ("good2.example", "Registrar: GANDI SAS\nRegistrar Registration Expiration Date: 2025-02-01T00:00:00Z\n"),
        ]),
    });
    let clock = Arc::new(VirtualClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()));
    let sink = Arc::new(CollectingSink::new());
    let monitor = ExpiryMonitor::with_parts(Arc::new(Config::default()), transport, clock.clone(), sink.clone());

    let records = monitor
        .check(&entries(&["good.example", "bad.example", "good2.example"]))
        .await;

    let domains: Vec<&str> = records.iter().map(|r| r.domain()).collect();
    assert_eq!(domains, vec!["good.example", "good2.example"]);
    assert!(records[0].days_left > 0);
    assert_eq!(records[0].urgency_class, UrgencyClass::Ok);
    assert_eq!(records[1].urgency_class, UrgencyClass::Soon);

    let failed: Vec<_> = sink
        .failures()
        .into_iter()
        .filter_map(|event| match event {
            QueryEvent::DomainFailed { domain, kind, .. } => Some((domain, kind)),
            _ => None,
        })
        .collect();
    assert_eq!(failed, vec![("bad.example".to_string(), "retry_budget_exhausted")]);
    assert_eq!(sink.attempts_for("bad.example"), 4);

    // Three inter-query delays plus three backoffs for the failing domain
    let config = Config::default();
    assert!(clock.elapsed() >= config.base_delay() * 3 + config.backoff() * 3);
}

#[tokio::test]
async fn test_unsupported_registrar_reported_once() {
    let transport = Arc::new(StubTransport {
        replies: HashMap::from([("other.example", "Registrar: OTHER REGISTRAR\nRegistry Expiry Date: 2030-01-01T00:00:00Z\n")]),
    });
    let clock = Arc::new(VirtualClock::new(Utc::now()));
    let sink = Arc::new(CollectingSink::new());
    let monitor = ExpiryMonitor::with_parts(Arc::new(Config::default()), transport, clock, sink.clone());

    let report = monitor.check_with_summary(&entries(&["other.example"])).await;
    assert!(report.records.is_empty());
    assert_eq!(report.summary.failed, 1);
    assert_eq!(sink.attempts_for("other.example"), 1);
    assert!(sink.events().iter().any(|event| matches!(
        event,
        QueryEvent::DomainFailed { reason, .. } if reason.contains("OTHER REGISTRAR")
    )));
}

/// Minimal whois server answering each connection from a fixed table.
async fn spawn_whois_server(replies: HashMap<&'static str, &'static str>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else { break };
            let replies = replies.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                let mut line = String::new();
                if reader.read_line(&mut line).await.is_err() {
                    return;
                }
                let reply = replies.get(line.trim()).copied().unwrap_or("No match for domain\n");
                let _ = reader.get_mut().write_all(reply.as_bytes()).await;
                let _ = reader.get_mut().shutdown().await;
            });
        }
    });

    port
}

#[tokio::test]
async fn test_tcp_monitor_renders_report() {
    let port = spawn_whois_server(HashMap::from([
        ("rezo.net", "Domain Name: REZO.NET\r\nUpdated Date: 2020-01-01T00:00:00Z\r\nRegistrar: GANDI SAS\r\nRegistry Expiry Date: 2099-03-07T05:00:00Z\r\n"),
        ("visionscarto.net", "Domain Name: VISIONSCARTO.NET\r\nRegistrar: GANDI SAS\r\nRegistry Expiry Date: 2000-05-20T14:01:45Z\r\n"),
    ]))
    .await;

    let config = Config {
        server: "127.0.0.1".to_string(),
        port,
        base_delay_seconds: 0,
        whois_timeout_seconds: 5,
        ..Config::default()
    };
    let monitor = ExpiryMonitor::new_with_config(Arc::new(config));

    let mut records = monitor
        .check(&entries(&["rezo.net", "unknown.net", "visionscarto.net"]))
        .await;
    assert_eq!(records.len(), 2);

    report::sort_by_days_left(&mut records);
    assert_eq!(records[0].domain(), "visionscarto.net");
    assert_eq!(records[0].urgency_class, UrgencyClass::Past);
    assert_eq!(records[1].expiration_raw, "2099-03-07T05:00:00Z");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.html");
    let html = report::render(report::DEFAULT_TEMPLATE, &records, Utc::now()).unwrap();
    report::write_report(&path, &html).await.unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("visionscarto.net"));
    assert!(written.contains(r#"<tr class="past">"#));
}

#[tokio::test]
async fn test_latin1_whois_reply_resolves_in_one_attempt() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut reader = BufReader::new(socket);
        let mut line = String::new();
        let _ = reader.read_line(&mut line).await;
        let reply: &[u8] = b"Domain Name: REZO.NET\r\n\
Registrant Organization: R\xe9seau des copains\r\n\
Registrar: GANDI SAS\r\n\
Registry Expiry Date: 2099-03-07T05:00:00Z\r\n";
        let _ = reader.get_mut().write_all(reply).await;
        let _ = reader.get_mut().shutdown().await;
    });

    let config = Config {
        server: "127.0.0.1".to_string(),
        port,
        base_delay_seconds: 0,
        whois_timeout_seconds: 5,
        ..Config::default()
    };
    let clock = Arc::new(VirtualClock::new(Utc::now()));
    let sink = Arc::new(CollectingSink::new());
    let config = Arc::new(config);
    let transport = Arc::new(TcpWhoisTransport::new(&config));
    let monitor = ExpiryMonitor::with_parts(config, transport, clock, sink.clone());

    let records = monitor.check(&entries(&["rezo.net"])).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].expiration_raw, "2099-03-07T05:00:00Z");
    assert_eq!(sink.attempts_for("rezo.net"), 1);
}
