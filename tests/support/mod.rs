#![allow(dead_code)]

pub(crate) mod spicedb;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use kc2spicedb::enhance::{EnhanceError, EnhancementRequest, Enhancer};
use kc2spicedb::generator::graph::SchemaGraph;
use kc2spicedb::generator::graph_builder;
use kc2spicedb::parser::realm::RealmModel;
use kc2spicedb::parser::realm_parser::parse_realm;
use kc2spicedb::{translate, TranslateOptions};

pub(crate) fn fixture_dir(fixture: &str) -> PathBuf {
    PathBuf::from("tests/fixtures").join(fixture)
}

pub(crate) fn fixture_path(fixture: &str) -> PathBuf {
    fixture_dir(fixture).join("realm.json")
}

pub(crate) fn read_fixture_realm(fixture: &str) -> String {
    std::fs::read_to_string(fixture_path(fixture)).expect("fixture realm should be readable")
}

pub(crate) fn parse_fixture(fixture: &str) -> RealmModel {
    parse_realm(&read_fixture_realm(fixture)).expect("fixture realm should parse")
}

pub(crate) fn build_fixture_graph(fixture: &str) -> SchemaGraph {
    graph_builder::build(&parse_fixture(fixture))
}

pub(crate) fn baseline_schema(fixture: &str) -> String {
    translate(&read_fixture_realm(fixture), &TranslateOptions::default())
        .expect("fixture realm should translate")
}

pub(crate) fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}_{nanos}"));
    std::fs::create_dir_all(&dir).expect("should create temp dir");
    dir
}

/// What a [`ScriptedEnhancer`] does on one call.
pub(crate) enum Reply {
    Schema(String),
    Fail(EnhanceError),
    Sleep(Duration),
    Panic,
}

/// Enhancer that plays back a fixed script of replies and counts its calls.
///
/// Once the script is exhausted every further call fails.
pub(crate) struct ScriptedEnhancer {
    replies: Mutex<VecDeque<Reply>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedEnhancer {
    pub(crate) fn new(replies: Vec<Reply>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let enhancer = Self {
            replies: Mutex::new(replies.into()),
            calls: Arc::clone(&calls),
        };
        (enhancer, calls)
    }

    pub(crate) fn replying(schema: &str) -> (Self, Arc<AtomicUsize>) {
        Self::new(vec![Reply::Schema(schema.to_string())])
    }
}

impl Enhancer for ScriptedEnhancer {
    fn name(&self) -> &str {
        "scripted"
    }

    fn enhance(&self, _request: &EnhancementRequest) -> Result<String, EnhanceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .replies
            .lock()
            .expect("script lock should not be poisoned")
            .pop_front();
        match reply {
            Some(Reply::Schema(schema)) => Ok(schema),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Sleep(delay)) => {
                std::thread::sleep(delay);
                Ok("definition user {}".to_string())
            }
            Some(Reply::Panic) => panic!("scripted enhancer panic"),
            None => Err(EnhanceError::Transport("script exhausted".to_string())),
        }
    }
}
