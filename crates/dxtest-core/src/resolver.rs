use crate::{
    constants::test_framework,
    manifest::{AppletOverrides, Dependency, Manifest, RunSpecOverrides},
    model::DependencyRequest,
};

fn test_framework_dependencies() -> [Dependency; 2] {
    let runner = Dependency::new(
        test_framework::RUNNER_NAME,
        test_framework::RUNNER_PACKAGE_MANAGER,
    );

    let mut loader = Dependency::new(
        test_framework::LOADER_NAME,
        test_framework::LOADER_PACKAGE_MANAGER,
    );
    loader.url = Some(test_framework::LOADER_URL.to_string());
    loader.build_commands = Some(test_framework::LOADER_BUILD_COMMANDS.to_string());

    [runner, loader]
}

/// Builds the minimal `execDepends` for a test build of an applet: only the requested
/// modules (optionally pinned to a tag), followed by the test framework itself.
///
/// Requests that name nothing in `base` are logged and dropped.
pub fn resolve(base: &Manifest, requests: &[DependencyRequest]) -> AppletOverrides {
    let mut exec_depends = Vec::with_capacity(requests.len() + 2);

    for request in requests {
        let Some(found) = base.find(&request.name) else {
            tracing::warn!(
                "Requested module {} not found in the applet manifest!",
                request.name
            );
            continue;
        };

        let mut dependency = found.clone();
        if request.is_main() {
            tracing::info!("Loading additional module {}", request.name);
        } else {
            tracing::info!(
                "Loading additional module {} from branch {}",
                request.name,
                request.version
            );
            dependency.tag = Some(request.version.clone());
        }
        exec_depends.push(dependency);
    }

    tracing::info!(
        "Loading base testing module(s) {}, {}",
        test_framework::RUNNER_NAME,
        test_framework::LOADER_NAME
    );
    exec_depends.extend(test_framework_dependencies());

    AppletOverrides {
        run_spec: RunSpecOverrides { exec_depends },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    fn dep(name: &str, manager: &str) -> Dependency {
        let mut d = Dependency::new(name, manager);
        d.url = Some(format!("https://example.org/{}.git", name));
        d
    }

    fn base_manifest() -> Manifest {
        Manifest::new(vec![
            dep("general_utilities", "git"),
            dep("burden", "git"),
            dep("extract", "git"),
        ])
        .unwrap()
    }

    fn req(token: &str) -> DependencyRequest {
        token.parse().unwrap()
    }

    fn names(overrides: &AppletOverrides) -> Vec<&str> {
        overrides
            .exec_depends()
            .iter()
            .map(|d| d.name.as_str())
            .collect()
    }

    #[test]
    fn test_main_request_copies_entry_unmodified() {
        let base = base_manifest();
        let overrides = resolve(&base, &[req("general_utilities")]);
        assert_eq!(
            &overrides.exec_depends()[0],
            base.find("general_utilities").unwrap()
        );
    }

    #[test]
    fn test_versioned_request_sets_tag() {
        let base = base_manifest();
        let overrides = resolve(&base, &[req("burden:v1.2.0")]);
        let burden = &overrides.exec_depends()[0];
        assert_eq!(burden.tag.as_deref(), Some("v1.2.0"));
        assert_eq!(burden.url, base.find("burden").unwrap().url);
        assert_eq!(base.find("burden").unwrap().tag, None);
    }

    #[test]
    fn test_unknown_request_is_dropped() {
        let base = base_manifest();
        let overrides = resolve(&base, &[req("nonexistent"), req("extract")]);
        assert_eq!(names(&overrides), vec!["extract", "pytest", "test_loader"]);
    }

    #[test]
    fn test_fixed_dependencies_always_appended() {
        let overrides = resolve(&Manifest::default(), &[]);
        assert_eq!(names(&overrides), vec!["pytest", "test_loader"]);

        let loader = &overrides.exec_depends()[1];
        assert_eq!(loader.package_manager.as_deref(), Some("git"));
        assert_eq!(
            loader.url.as_deref(),
            Some("https://github.com/mrcepid-rap/mrcepid-testing.git")
        );
        assert_eq!(loader.build_commands.as_deref(), Some("pip3 install ."));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Ok(mut inner) = self.0.lock() {
                inner.extend_from_slice(buf);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_unknown_request_logs_warning() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        let overrides = tracing::subscriber::with_default(subscriber, || {
            resolve(&base_manifest(), &[req("nonexistent")])
        });

        assert_eq!(names(&overrides), vec!["pytest", "test_loader"]);
        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"), "no warning in: {}", output);
        assert!(output.contains("nonexistent"));
    }

    #[test]
    fn test_requests_keep_request_order() {
        let overrides = resolve(&base_manifest(), &[req("extract"), req("general_utilities")]);
        assert_eq!(
            names(&overrides),
            vec!["extract", "general_utilities", "pytest", "test_loader"]
        );
    }

    #[test]
    fn test_explicit_framework_request_is_duplicated() {
        let base = Manifest::new(vec![Dependency::new("pytest", "pip")]).unwrap();
        let overrides = resolve(&base, &[req("pytest")]);
        assert_eq!(names(&overrides), vec!["pytest", "pytest", "test_loader"]);
    }
}
