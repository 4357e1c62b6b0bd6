pub mod defaults {
    pub const INSTANCE_TYPE: &str = "mem1_ssd1_v2_x4";
    pub const POLL_INTERVAL_SECS: u64 = 10;
    pub const OUTPUT_DIR: &str = "test_out";
    pub const MANIFEST_FILE: &str = "dxapp.json";
    pub const MAIN_VERSION: &str = "main";
}

pub mod naming {
    pub const RUN_STAMP_FORMAT: &str = "%Y%m%d%H%M%S";
    pub const APPLET_SUFFIX: &str = "_test";
    pub const SCRATCH_SUFFIX: &str = "_tmpdata";
    pub const JOB_PREFIX: &str = "dxtest";
}

pub mod artifacts {
    pub const OUTPUT_FIELD: &str = "output_tarball";
    pub const DOWNLOAD_NAME: &str = "output.tar.gz";
    pub const RESOURCES_DIR: &str = "resources";
    pub const RESOURCES_BUNDLE: &str = "resources.tar.gz";
    pub const LOG_PREFIX: &str = "pytest";
}

pub mod inputs {
    pub const TESTING_SCRIPT: &str = "testing_script";
    pub const TESTING_DIRECTORY: &str = "testing_directory";
    pub const OUTPUT_PREFIX: &str = "output_prefix";
}

pub mod platform {
    pub const LINK_KEY: &str = "$dnanexus_link";
    pub const FILE_CLOSED: &str = "closed";
    pub const PROJECT_ENV: &str = "DX_PROJECT_CONTEXT_ID";
    pub const WORKSPACE_ENV: &str = "DX_WORKSPACE_ID";
}

pub mod test_framework {
    pub const RUNNER_NAME: &str = "pytest";
    pub const RUNNER_PACKAGE_MANAGER: &str = "pip";
    pub const LOADER_NAME: &str = "test_loader";
    pub const LOADER_PACKAGE_MANAGER: &str = "git";
    pub const LOADER_URL: &str = "https://github.com/mrcepid-rap/mrcepid-testing.git";
    pub const LOADER_BUILD_COMMANDS: &str = "pip3 install .";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants() {
        assert_eq!(defaults::INSTANCE_TYPE, "mem1_ssd1_v2_x4");
        assert_eq!(defaults::POLL_INTERVAL_SECS, 10);
        assert_eq!(defaults::MAIN_VERSION, "main");
    }

    #[test]
    fn test_platform_constants() {
        assert_eq!(platform::LINK_KEY, "$dnanexus_link");
        assert_eq!(artifacts::OUTPUT_FIELD, "output_tarball");
    }
}
