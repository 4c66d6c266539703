// src/downloader/planner.rs

use crate::{
    models::{Artifact, Course, FileInfo},
    utils,
};
use log::debug;
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

/// 为产物分配输出路径，保证同一次运行中每个目标路径唯一。
/// 比较不区分大小写，以免在 Windows/macOS 上互相覆盖。
pub struct PathPlanner {
    numbered_sections: bool,
    taken_files: HashSet<String>,
    course_dirs: HashMap<String, PathBuf>,
    taken_course_names: HashSet<String>,
}

fn fold_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

impl PathPlanner {
    /// `reserved_dir` 是输出根目录下保留给调试页面的目录，课程不能占用。
    pub fn new(numbered_sections: bool, reserved_dir: &str) -> Self {
        Self {
            numbered_sections,
            taken_files: HashSet::new(),
            course_dirs: HashMap::new(),
            taken_course_names: HashSet::from([reserved_dir.to_lowercase()]),
        }
    }

    /// 课程目录使用课程名；重名的课程追加课程 ID 区分，
    /// 仍然冲突时再追加序号 `name (id-2)`、`name (id-3)` ...
    pub fn course_dir(&mut self, course: &Course) -> PathBuf {
        if let Some(dir) = self.course_dirs.get(&course.id) {
            return dir.clone();
        }
        let mut name = utils::sanitize_filename(&course.name);
        let mut n = 1;
        while !self.taken_course_names.insert(name.to_lowercase()) {
            let tag = if n == 1 {
                course.id.clone()
            } else {
                format!("{}-{}", course.id, n)
            };
            name = utils::sanitize_filename(&format!("{} ({})", course.name, tag));
            n += 1;
        }
        let dir = PathBuf::from(name);
        self.course_dirs.insert(course.id.clone(), dir.clone());
        dir
    }

    pub fn section_dir(&self, ordinal: usize, title: &str, section_count: usize) -> PathBuf {
        let title = utils::sanitize_filename(title);
        if self.numbered_sections {
            let width = section_count.to_string().len().max(2);
            PathBuf::from(format!("{:0width$} - {}", ordinal, title, width = width))
        } else {
            PathBuf::from(title)
        }
    }

    /// 同一目录中后出现的同名产物得到 `name (2).ext`、`name (3).ext` ...
    pub fn place(&mut self, course_dir: &Path, section_dir: &Path, artifact: Artifact) -> FileInfo {
        let dir = course_dir.join(section_dir).join(&artifact.subpath);
        let mut filename = artifact.filename.clone();
        let mut n = 1;
        while !self.taken_files.insert(fold_key(&dir.join(&filename))) {
            n += 1;
            filename = utils::with_numeric_suffix(&artifact.filename, n);
        }
        if n > 1 {
            debug!("文件名冲突: '{}' 重命名为 '{}'", artifact.filename, filename);
        }
        FileInfo {
            filepath: dir.join(filename),
            source: artifact.source,
            size: artifact.size,
            kind: artifact.kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn course(id: &str, name: &str) -> Course {
        Course {
            id: id.into(),
            name: name.into(),
            favorite: true,
            url: Url::parse(&format!("https://lms.example.edu/course/view.php?id={}", id)).unwrap(),
        }
    }

    fn pdf(name: &str) -> Artifact {
        let url = Url::parse("https://lms.example.edu/pluginfile.php/1/x.pdf").unwrap();
        Artifact::remote(url, PathBuf::new(), name.to_string(), None)
    }

    #[test]
    fn test_collisions_get_numeric_suffix() {
        let mut planner = PathPlanner::new(false, "_debug");
        let c = PathBuf::from("Algorithms101");
        let s = PathBuf::from("Week 1");
        let first = planner.place(&c, &s, pdf("slides.pdf"));
        let second = planner.place(&c, &s, pdf("Slides.PDF"));
        let third = planner.place(&c, &s, pdf("slides.pdf"));
        assert_eq!(first.filepath, PathBuf::from("Algorithms101/Week 1/slides.pdf"));
        assert_eq!(second.filepath, PathBuf::from("Algorithms101/Week 1/Slides (2).PDF"));
        assert_eq!(third.filepath, PathBuf::from("Algorithms101/Week 1/slides (3).pdf"));

        let other_dir = planner.place(&c, Path::new("Week 2"), pdf("slides.pdf"));
        assert_eq!(other_dir.filepath, PathBuf::from("Algorithms101/Week 2/slides.pdf"));
    }

    #[test]
    fn test_duplicate_course_names_and_reserved_dir() {
        let mut planner = PathPlanner::new(false, "_debug");
        assert_eq!(planner.course_dir(&course("2", "Algorithms101")), PathBuf::from("Algorithms101"));
        assert_eq!(planner.course_dir(&course("9", "Algorithms101")), PathBuf::from("Algorithms101 (9)"));
        assert_eq!(planner.course_dir(&course("2", "Algorithms101")), PathBuf::from("Algorithms101"));
        assert_eq!(planner.course_dir(&course("5", "_debug")), PathBuf::from("_debug (5)"));
    }

    #[test]
    fn test_disambiguated_course_never_joins_existing_dir() {
        let mut planner = PathPlanner::new(false, "_debug");
        assert_eq!(planner.course_dir(&course("1", "X (9)")), PathBuf::from("X (9)"));
        assert_eq!(planner.course_dir(&course("2", "X")), PathBuf::from("X"));
        assert_eq!(planner.course_dir(&course("9", "X")), PathBuf::from("X (9-2)"));
        assert_eq!(planner.course_dir(&course("4", "x (9-2)")), PathBuf::from("x (9-2) (4)"));
    }

    #[test]
    fn test_numbered_sections() {
        let planner = PathPlanner::new(true, "_debug");
        assert_eq!(planner.section_dir(3, "Week 2: Sorting", 12), PathBuf::from("03 - Week 2_ Sorting"));
        assert_eq!(planner.section_dir(101, "Extra", 120), PathBuf::from("101 - Extra"));
        let plain = PathPlanner::new(false, "_debug");
        assert_eq!(plain.section_dir(3, "Week 2: Sorting", 12), PathBuf::from("Week 2_ Sorting"));
    }
}
