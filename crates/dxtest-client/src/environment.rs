use crate::error::{BuildError, TeardownError};
use crate::events::{EventSink, LifecycleEvent};
use dxtest_core::{
    constants::naming,
    errors::GatewayError,
    gateway::Gateway,
    manifest::AppletOverrides,
    model::{AppletId, FileId, ResourceBundle, RunStamp},
};
use std::path::{Component, Path};
use walkdir::WalkDir;

/// Remote objects created for one test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentHandle {
    pub applet_id: AppletId,
    pub applet_name: String,
    pub folder_name: String,
    pub script_id: FileId,
    pub resources: Vec<ResourceBundle>,
}

pub fn applet_name(src_dir_basename: &str, stamp: &RunStamp) -> String {
    format!("{}{}_{}", src_dir_basename, naming::APPLET_SUFFIX, stamp)
}

pub fn scratch_folder(applet_name: &str) -> String {
    format!("/{}{}/", applet_name, naming::SCRATCH_SUFFIX)
}

/// Joins a relative local path onto a remote folder using `/` separators.
pub fn remote_join(folder: &str, relative: &Path) -> String {
    let mut remote = folder.trim_end_matches('/').to_string();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            remote.push('/');
            remote.push_str(&part.to_string_lossy());
        }
    }
    remote.push('/');
    remote
}

pub struct EnvironmentBuilder<'a> {
    gateway: &'a dyn Gateway,
    stamp: &'a RunStamp,
}

impl<'a> EnvironmentBuilder<'a> {
    pub fn new(gateway: &'a dyn Gateway, stamp: &'a RunStamp) -> Self {
        Self { gateway, stamp }
    }

    pub fn build(
        &self,
        test_script: &Path,
        test_files_dir: &Path,
        src_dir: &Path,
        overrides: &AppletOverrides,
    ) -> Result<EnvironmentHandle, BuildError> {
        let abs_src = fs_err::canonicalize(src_dir).map_err(|e| BuildError::SourceDir {
            path: src_dir.to_path_buf(),
            source: e,
        })?;
        let basename = abs_src
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| BuildError::SourceDir {
                path: abs_src.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "source directory has no final path component",
                ),
            })?;

        let resources =
            self.gateway
                .upload_resources(&abs_src)
                .map_err(|e| BuildError::Resources {
                    src_dir: abs_src.clone(),
                    source: e,
                })?;

        let name = applet_name(&basename, self.stamp);
        tracing::info!("Building test applet '{}'", name);
        let applet_id = match self
            .gateway
            .upload_applet(&abs_src, &resources, &name, overrides)
        {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("Failed to build applet '{}': {}", name, e);
                self.rollback(None, &resources);
                return Err(BuildError::Applet { name, source: e });
            }
        };

        let folder = scratch_folder(&name);
        let script_id = match self.stage_test_data(&folder, test_script, test_files_dir) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("Failed to stage test data in '{}': {}", folder, e);
                self.rollback(Some(&applet_id), &resources);
                return Err(BuildError::TestData { folder, source: e });
            }
        };

        tracing::info!("Test environment ready: applet {} in {}", applet_id, folder);
        Ok(EnvironmentHandle {
            applet_id,
            applet_name: name,
            folder_name: folder,
            script_id,
            resources,
        })
    }

    fn stage_test_data(
        &self,
        folder: &str,
        test_script: &Path,
        test_files_dir: &Path,
    ) -> Result<FileId, GatewayError> {
        self.gateway.new_folder(folder)?;
        let script_id = self.gateway.upload_file(test_script, folder)?;
        tracing::debug!("Uploaded test script {} as {}", test_script.display(), script_id);

        for entry in WalkDir::new(test_files_dir)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry?;
            let relative = entry
                .path()
                .strip_prefix(test_files_dir)
                .unwrap_or(entry.path());
            if entry.file_type().is_dir() {
                self.gateway.new_folder(&remote_join(folder, relative))?;
            } else {
                let parent = relative.parent().unwrap_or(Path::new(""));
                let id = self
                    .gateway
                    .upload_file(entry.path(), &remote_join(folder, parent))?;
                tracing::debug!("Uploaded {} as {}", relative.display(), id);
            }
        }
        Ok(script_id)
    }

    fn rollback(&self, applet: Option<&AppletId>, resources: &[ResourceBundle]) {
        if let Some(applet) = applet {
            if let Err(e) = self.gateway.remove_objects(&[applet.to_string()]) {
                tracing::warn!("Could not remove applet {} during rollback: {}", applet, e);
            }
        }
        if resources.is_empty() {
            return;
        }
        let ids: Vec<String> = resources.iter().map(|r| r.file_id().0).collect();
        if let Err(e) = self.gateway.remove_objects(&ids) {
            tracing::warn!("Could not remove resources during rollback: {}", e);
        }
    }
}

/// Removes the applet, then the scratch folder with its contents. Every step is
/// attempted; the last failure is returned.
pub fn teardown(gateway: &dyn Gateway, handle: &EnvironmentHandle) -> Result<(), TeardownError> {
    let mut failed = Vec::new();
    let mut last = None;

    if let Err(e) = gateway.remove_objects(&[handle.applet_id.to_string()]) {
        tracing::error!("Failed to remove applet {}: {}", handle.applet_id, e);
        failed.push(handle.applet_id.to_string());
        last = Some(e);
    }
    if let Err(e) = gateway.remove_folder(&handle.folder_name, true) {
        tracing::error!("Failed to remove folder {}: {}", handle.folder_name, e);
        failed.push(handle.folder_name.clone());
        last = Some(e);
    }

    match last {
        Some(last) => Err(TeardownError { failed, last }),
        None => Ok(()),
    }
}

/// Owns a built environment until it is torn down, either by [`Environment::release`]
/// or on drop.
pub struct Environment<'a> {
    gateway: &'a dyn Gateway,
    handle: EnvironmentHandle,
    events: EventSink,
    released: bool,
}

impl<'a> Environment<'a> {
    pub fn new(gateway: &'a dyn Gateway, handle: EnvironmentHandle, events: EventSink) -> Self {
        Self {
            gateway,
            handle,
            events,
            released: false,
        }
    }

    pub fn handle(&self) -> &EnvironmentHandle {
        &self.handle
    }

    pub fn release(mut self) -> Result<(), TeardownError> {
        self.released = true;
        self.teardown()
    }

    fn teardown(&self) -> Result<(), TeardownError> {
        self.events.send(LifecycleEvent::TearingDown);
        let result = teardown(self.gateway, &self.handle);
        self.events.send(LifecycleEvent::TornDown {
            clean: result.is_ok(),
        });
        result
    }
}

impl Drop for Environment<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        tracing::warn!(
            "Test run for '{}' did not finish; removing its remote objects",
            self.handle.applet_name
        );
        if let Err(e) = self.teardown() {
            tracing::error!("Cleanup after an interrupted run was incomplete: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming() {
        let stamp = RunStamp::from("20240101120000");
        let name = applet_name("mrcepid-runassociationtesting", &stamp);
        assert_eq!(name, "mrcepid-runassociationtesting_test_20240101120000");
        assert_eq!(
            scratch_folder(&name),
            "/mrcepid-runassociationtesting_test_20240101120000_tmpdata/"
        );
    }

    #[test]
    fn test_remote_join() {
        assert_eq!(remote_join("/a_tmpdata/", Path::new("")), "/a_tmpdata/");
        assert_eq!(
            remote_join("/a_tmpdata/", Path::new("level1/level2")),
            "/a_tmpdata/level1/level2/"
        );
    }
}
