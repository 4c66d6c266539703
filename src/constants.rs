// src/constants.rs

pub const UI_WIDTH: usize = 88;
pub const FILENAME_TRUNCATE_LENGTH: usize = 65;
pub const MAX_FILENAME_BYTES: usize = 200;
pub const CONFIG_DIR_NAME: &str = concat!(".", clap::crate_name!());
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LOG_FILE_NAME: &str = concat!(clap::crate_name!(), ".log");
pub const LOG_FALLBACK_FILE_NAME: &str = "fallback.log";
pub const DEFAULT_SAVE_DIR: &str = "MoodleContent";
pub const DEFAULT_DEBUG_DIR: &str = "_debug";
pub const DEFAULT_SELECTION: &str = "all";
pub const DEFAULT_WORKERS: usize = 5;
pub const TEMP_FILE_PREFIX: &str = ".moodle-dl-";
pub const TEMP_FILE_SUFFIX: &str = ".part";
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/112.0.0.0 Safari/537.36";

pub const ENV_USERNAME: &str = "MOODLE_USERNAME";
pub const ENV_PASSWORD: &str = "MOODLE_PASSWORD";

/// 以下目录与文件名会直接出现在输出树中，改动它们会破坏断点续传。
pub mod layout {
    pub const MAIN_CONTENT_SECTION: &str = "Main Content";
    pub const SECTION_PLACEHOLDER_PREFIX: &str = "Section";
    pub const ASSIGNMENT_DESCRIPTION_FILE: &str = "description.txt";
    pub const FALLBACK_EXTENSION: &str = ".bin";
}

pub mod moodle {
    pub const LOGIN_PATH: &str = "/login/index.php";
    pub const COURSE_VIEW: &str = "course/view.php";
    pub const PLUGINFILE: &str = "pluginfile.php";
    pub const LEGACY_FILE: &str = "file.php";
    pub const RESOURCE_VIEW: &str = "/mod/resource/view.php";
    pub const DASHBOARD_PAGES: [&str; 2] = ["/my/courses.php", "/my/index.php"];
    pub const ENROLLED_PAGES: [&str; 1] = ["/user/profile.php"];
    pub const LOGIN_TOKEN_FIELDS: [&str; 3] = ["logintoken", "sesskey", "_csrf"];
    pub const LOGIN_FAILURE_MARKERS: [&str; 4] = [
        "Log in to the site",
        "loginform",
        "Login to your account",
        "loginerrormessage",
    ];

    pub mod modtypes {
        pub const RESOURCE: &str = "resource";
        pub const FOLDER: &str = "folder";
        pub const ASSIGN: &str = "assign";
    }
}
