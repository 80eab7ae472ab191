//! Test data builders for creating test entities
//!
//! This module provides builder patterns for creating test data with
//! sensible defaults and easy customization.

use std::collections::BTreeMap;

use fleet_core::models::{
    Job, PortMapping, TaskState, TaskStatus, ThrottleState,
};

/// Builder for creating test Job entities
pub struct TestJobBuilder {
    name: String,
    version: String,
    image: String,
    static_ports: Vec<u16>,
    env: Vec<(String, String)>,
}

impl TestJobBuilder {
    pub fn new() -> Self {
        Self {
            name: "test_job".to_string(),
            version: "1".to_string(),
            image: "busybox:latest".to_string(),
            static_ports: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_image(mut self, image: &str) -> Self {
        self.image = image.to_string();
        self
    }

    /// Reserve an external port; the internal port mirrors it
    pub fn with_static_port(mut self, port: u16) -> Self {
        self.static_ports.push(port);
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> Job {
        let mut builder = Job::builder(self.name, self.version, self.image)
            .port("admin", PortMapping::dynamic(9000));
        for port in self.static_ports {
            builder = builder.port(format!("p{port}"), PortMapping::fixed(port, port));
        }
        for (key, value) in self.env {
            builder = builder.env(key, value);
        }
        builder.build().expect("test job fields are valid")
    }
}

impl Default for TestJobBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test TaskStatus records
pub struct TaskStatusBuilder {
    status: TaskStatus,
}

impl TaskStatusBuilder {
    pub fn new(job: Job) -> Self {
        Self {
            status: TaskStatus::new(job, TaskState::Running),
        }
    }

    pub fn with_state(mut self, state: TaskState) -> Self {
        self.status.state = state;
        self
    }

    pub fn with_container_id(mut self, container_id: &str) -> Self {
        self.status.container_id = Some(container_id.to_string());
        self
    }

    pub fn throttled(mut self, throttled: ThrottleState) -> Self {
        self.status.throttled = throttled;
        self
    }

    pub fn with_ports(mut self) -> Self {
        self.status.ports = Some(self.status.job.ports.clone());
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.status.env = env;
        self
    }

    pub fn build(self) -> TaskStatus {
        self.status
    }
}
