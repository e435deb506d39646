// Testing utilities for the domain layer
// Available to this crate's tests and, with the "mock" feature, to dependent crates

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{ChatMessage, LlmClient, LlmError};
use mediquery_data::loader::{self, LoadReport, LoaderConfig, LoaderError};

/// Small MySQL-flavoured hospital dump used by tests
pub const HOSPITAL_FIXTURE_SQL: &str = "\
CREATE TABLE `department` (
  `department_id` int(11) NOT NULL AUTO_INCREMENT,
  `name` varchar(50) NOT NULL,
  PRIMARY KEY (`department_id`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;

CREATE TABLE `doctor` (
  `doctor_id` int(11) NOT NULL,
  `name` varchar(100) NOT NULL,
  `department_id` int(11) NOT NULL,
  `fee` decimal(10,2) DEFAULT NULL,
  PRIMARY KEY (`doctor_id`),
  FOREIGN KEY (`department_id`) REFERENCES `department` (`department_id`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;

CREATE TABLE `patient` (
  `patient_id` int(11) NOT NULL,
  `name` varchar(100) NOT NULL,
  `doctor_id` int(11) DEFAULT NULL,
  PRIMARY KEY (`patient_id`),
  FOREIGN KEY (`doctor_id`) REFERENCES `doctor` (`doctor_id`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;

INSERT INTO `department` VALUES (1,'Cardiology'),(2,'Neurology');
INSERT INTO `doctor` VALUES (1,'Dr. Grey',1,150.00),(2,'Dr. House',2,200.50),(3,'Dr. Yang',1,180.00);
INSERT INTO `patient` VALUES (10,'Alice',1),(11,'Bob',2),(12,'Carol',1),(13,'Dan',3);
";

/// Load [`HOSPITAL_FIXTURE_SQL`] into a new SQLite file at `database_path`.
///
/// The dump is written next to the database with a `.sql` extension.
pub fn create_fixture_database(database_path: &Path) -> Result<LoadReport, LoaderError> {
    let sql_file = database_path.with_extension("sql");
    fs::write(&sql_file, HOSPITAL_FIXTURE_SQL)?;

    loader::create_database(&LoaderConfig {
        sql_file,
        database_path: database_path.to_path_buf(),
    })
}

/// LLM client that replays canned replies in order and records every request
pub struct ScriptedLlmClient {
    model: String,
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            model: "scripted-model".to_string(),
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Conversations sent so far, oldest first
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }

    /// Replies not yet consumed
    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        // Running out of script behaves like a model that returned nothing
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(LlmError::EmptyResponse)
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}
