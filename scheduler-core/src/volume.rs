// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! A container volume mount, and the pure function that renders it into the
//! single docker `volume` parameter a task builder embeds in its payload.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeMode {
    ReadOnly,
    ReadWrite,
}

impl VolumeMode {
    fn as_str(&self) -> &'static str {
        match self {
            VolumeMode::ReadOnly => "ro",
            VolumeMode::ReadWrite => "rw",
        }
    }
}

/// A docker parameter, as handed to the container task builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerParam {
    pub key: String,
    pub value: String,
}

/// A volume to be mounted into a task's container, either a direct host mount
/// or a named docker volume (optionally created through a volume driver).
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub container_path: String,
    pub mode: VolumeMode,
    pub is_host: bool,
    pub host_path: Option<String>,
    pub name: Option<String>,
    pub driver: Option<String>,
    pub driver_opts: Vec<(String, String)>,
}

impl Volume {
    pub fn host_mount(host_path: impl Into<String>, container_path: impl Into<String>, mode: VolumeMode) -> Self {
        Volume {
            container_path: container_path.into(),
            mode,
            is_host: true,
            host_path: Some(host_path.into()),
            name: None,
            driver: None,
            driver_opts: Vec::new(),
        }
    }

    pub fn named_volume(name: impl Into<String>, container_path: impl Into<String>, mode: VolumeMode) -> Self {
        Volume {
            container_path: container_path.into(),
            mode,
            is_host: false,
            host_path: None,
            name: Some(name.into()),
            driver: None,
            driver_opts: Vec::new(),
        }
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    pub fn with_driver_opt(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.driver_opts.push((key.into(), value.into()));
        self
    }

    /// Renders this volume into the single `volume` docker parameter the
    /// container task builder attaches to a task's payload.
    ///
    /// A named volume always renders as a create-if-missing expression;
    /// there is no separate "volume already exists" form.
    pub fn to_docker_param(&self) -> DockerParam {
        let volume_name = if self.is_host {
            self.host_path.clone().unwrap_or_default()
        } else {
            let name = self.name.clone().unwrap_or_default();
            let mut driver_params = Vec::new();
            if let Some(driver) = &self.driver {
                driver_params.push(format!("--driver {}", driver));
            }
            for (key, value) in &self.driver_opts {
                driver_params.push(format!("--opt {}={}", key, value));
            }
            if driver_params.is_empty() {
                format!("$(docker volume create --name {})", name)
            } else {
                format!(
                    "$(docker volume create --name {} {})",
                    name,
                    driver_params.join(" ")
                )
            }
        };

        let value = format!("{}:{}:{}", volume_name, self.container_path, self.mode.as_str());
        DockerParam {
            key: "volume".to_string(),
            value,
        }
    }
}
