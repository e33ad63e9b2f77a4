//! Shared fixtures for ct-core integration tests.
//!
//! Each fixture owns a temp directory holding a model artifact, both encoder
//! artifacts, a dataset, and a `config.toml` pointing at all of them.

#![allow(dead_code)]

use ct_core::encode::{CategoricalEncoder, VocabularyTable};
use ct_core::features::FEATURE_COUNT;
use ct_core::model::{DecisionTree, LogisticRegression, ModelArtifact, ModelSpec, RandomForest, TreeNode};
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const HEADER: &str =
    "id.orig_h,id.orig_p,id.resp_h,id.resp_p,proto,duration,orig_bytes,resp_bytes,conn_state,label";

/// 24 tcp rows with long durations, 12 udp rows with short ones, 3 icmp rows.
/// Row 5 leaves `orig_bytes` as `-` to exercise forward-fill.
pub fn standard_dataset() -> String {
    let mut lines = vec![HEADER.to_string()];
    for i in 0..24 {
        let bytes = if i == 5 { "-".to_string() } else { (100 + i * 13).to_string() };
        lines.push(format!(
            "192.168.1.{},{},10.0.0.{},80,tcp,{:.2},{},{},SF,Malicious",
            i % 7 + 1,
            40000 + i,
            i % 9 + 1,
            4.0 + (i % 6) as f64 * 0.75,
            bytes,
            200 + i
        ));
    }
    for i in 0..12 {
        lines.push(format!(
            "192.168.1.{},{},10.0.1.{},53,udp,{:.2},{},{},S0,Benign",
            i % 5 + 1,
            50000 + i,
            i % 4 + 1,
            0.5 + (i % 4) as f64 * 0.25,
            60 + i,
            120 + i
        ));
    }
    for i in 0..3 {
        lines.push(format!(
            "192.168.1.9,0,10.0.2.{},0,icmp,{:.2},64,64,OTH,Benign",
            i + 1,
            1.0 + i as f64
        ));
    }
    lines.join("\n") + "\n"
}

/// `p = sigmoid(-3 + 0.6 * duration)`: longer connections score higher.
pub fn duration_logistic() -> ModelArtifact {
    let mut coefficients = vec![0.0; FEATURE_COUNT];
    coefficients[5] = 0.6;
    ModelArtifact::new(ModelSpec::LogisticRegression(LogisticRegression {
        intercept: -3.0,
        coefficients,
    }))
}

/// One tree: `duration <= split` scores `low`, otherwise `high`.
pub fn duration_stump(split: f64, low: f64, high: f64) -> ModelArtifact {
    ModelArtifact::new(ModelSpec::RandomForest(RandomForest {
        trees: vec![DecisionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 5,
                    threshold: split,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { probability: low },
                TreeNode::Leaf { probability: high },
            ],
        }],
    }))
}

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub model: PathBuf,
    pub protocol_encoder: PathBuf,
    pub conn_state_encoder: PathBuf,
    pub dataset: PathBuf,
    pub config: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with(&standard_dataset(), &duration_logistic())
    }

    /// Encoders are fitted from `dataset` itself.
    pub fn with(dataset: &str, model: &ModelArtifact) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        let fixture = Self {
            model: root.join("model.json"),
            protocol_encoder: root.join("proto_encoder.json"),
            conn_state_encoder: root.join("conn_state_encoder.json"),
            dataset: root.join("conn.csv"),
            config: root.join("config.toml"),
            dir,
        };

        std::fs::write(&fixture.dataset, dataset).expect("write dataset");
        model.save(&fixture.model).expect("write model");
        let parsed = ct_core::dataset::parse_dataset_str(dataset).expect("fixture dataset parses");
        VocabularyTable::fit(parsed.records())
            .expect("fit encoders")
            .save(&fixture.protocol_encoder, &fixture.conn_state_encoder)
            .expect("write encoders");
        fixture.write_config("");
        fixture
    }

    /// Replace the fitted protocol encoder with one over `classes`.
    pub fn write_protocol_encoder(&self, classes: &[&str]) {
        CategoricalEncoder::protocol(classes.iter().map(|c| c.to_string()).collect())
            .expect("protocol encoder")
            .to_artifact()
            .save(&self.protocol_encoder)
            .expect("write protocol encoder");
    }

    /// Rewrite `config.toml` with the artifact section plus `extra`.
    pub fn write_config(&self, extra: &str) {
        let content = format!(
            "[artifacts]\nmodel = {:?}\nprotocol_encoder = {:?}\nconn_state_encoder = {:?}\ndataset = {:?}\n\n{extra}",
            toml_path(&self.model),
            toml_path(&self.protocol_encoder),
            toml_path(&self.conn_state_encoder),
            toml_path(&self.dataset),
        );
        std::fs::write(&self.config, content).expect("write config");
    }

    pub fn config_arg(&self) -> [String; 2] {
        ["--config".to_string(), self.config.display().to_string()]
    }

    pub fn resolved(&self) -> ct_core::config::ResolvedConfig {
        ct_core::config::load_config(&ct_core::config::ConfigOptions {
            config_path: Some(self.config.clone()),
        })
        .expect("fixture config loads")
    }
}

fn toml_path(path: &Path) -> String {
    path.display().to_string()
}

/// Minimal HTTP/1.1 GET over a fresh connection. Returns (status, body).
pub fn http_get(addr: SocketAddr, path: &str) -> (u16, String) {
    http_request(addr, "GET", path)
}

pub fn http_request(addr: SocketAddr, method: &str, path: &str) -> (u16, String) {
    let mut stream = std::net::TcpStream::connect(addr).expect("connect");
    write!(
        stream,
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
    )
    .expect("send request");
    let mut raw = String::new();
    stream.read_to_string(&mut raw).expect("read response");
    let (head, body) = raw.split_once("\r\n\r\n").unwrap_or((raw.as_str(), ""));
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("status line");
    (status, body.to_string())
}
