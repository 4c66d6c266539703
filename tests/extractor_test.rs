// tests/extractor_test.rs

mod common;

use common::*;
use moodle_dl::{
    config::AppConfig,
    error::AppError,
    extractor::{ResolveContext, ResolverRegistry, courses::CourseEnumerator},
    models::{ArtifactSource, Course, EnumerationWarning, Module, ModuleKind, Section},
    session::Session,
};
use std::{path::PathBuf, sync::Arc};
use url::Url;

fn course(server_url: &str) -> Course {
    Course {
        id: "2".into(),
        name: "Algorithms101".into(),
        favorite: true,
        url: Url::parse(&format!("{}/course/view.php?id=2", server_url)).unwrap(),
    }
}

fn section() -> Section {
    Section {
        ordinal: 1,
        title: "Week 1".into(),
        modules: Vec::new(),
    }
}

fn module(server_url: &str, kind: ModuleKind, path: &str, title: &str) -> Module {
    Module {
        id: "10".into(),
        kind,
        title: title.into(),
        url: Some(Url::parse(&format!("{}{}", server_url, path)).unwrap()),
    }
}

async fn session(server: &mut mockito::ServerGuard) -> (Session, Vec<mockito::Mock>) {
    let mocks = mock_login(server).await;
    let session = login(&server.url(), Arc::new(AppConfig::default())).await;
    (session, mocks)
}

#[tokio::test]
async fn test_resource_probe_uses_content_disposition_name() {
    let mut server = mockito::Server::new_async().await;
    let (session, _login) = session(&mut server).await;
    let _probe = server
        .mock("GET", "/mod/resource/view.php")
        .match_query(query_matcher(&[("id", "10"), ("redirect", "1")]))
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .with_header("content-disposition", r#"attachment; filename="Week1 Notes.pdf""#)
        .with_body("%PDF")
        .create_async()
        .await;

    let url = server.url();
    let (course, section) = (course(&url), section());
    let ctx = ResolveContext {
        session: &session,
        course: &course,
        section: &section,
    };
    let module = module(&url, ModuleKind::Resource, "/mod/resource/view.php?id=10", "Notes");
    let artifacts = ResolverRegistry::default().resolve(&module, &ctx).await.unwrap();

    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].filename, "Week1 Notes.pdf");
    assert_eq!(artifacts[0].size, Some(4));
    assert_eq!(artifacts[0].subpath, PathBuf::new());
}

#[tokio::test]
async fn test_resource_viewer_page_with_embedded_file() {
    let mut server = mockito::Server::new_async().await;
    let (session, _login) = session(&mut server).await;
    let _viewer = mock_page(
        &mut server,
        "/mod/resource/view.php",
        &[("id", "10"), ("redirect", "1")],
        r#"<div id="region-main"><div class="resourcecontent">
             <object data="/pluginfile.php/30/mod_resource/content/2/Lecture%203.pdf" type="application/pdf"></object>
           </div></div>"#,
    )
    .await;

    let url = server.url();
    let (course, section) = (course(&url), section());
    let ctx = ResolveContext {
        session: &session,
        course: &course,
        section: &section,
    };
    let module = module(&url, ModuleKind::Resource, "/mod/resource/view.php?id=10", "Lecture 3");
    let artifacts = ResolverRegistry::default().resolve(&module, &ctx).await.unwrap();

    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].filename, "Lecture 3.pdf");
    match &artifacts[0].source {
        ArtifactSource::Remote(file_url) => assert!(file_url.path().ends_with("Lecture%203.pdf")),
        other => panic!("应为远程文件, 实际为 {:?}", other),
    }
}

#[tokio::test]
async fn test_resource_without_file_keeps_page_for_debugging() {
    let mut server = mockito::Server::new_async().await;
    let (session, _login) = session(&mut server).await;
    let _viewer = mock_page(
        &mut server,
        "/mod/resource/view.php",
        &[("id", "10"), ("redirect", "1")],
        "<div id='region-main'><p>Hidden by the instructor</p></div>",
    )
    .await;

    let url = server.url();
    let (course, section) = (course(&url), section());
    let ctx = ResolveContext {
        session: &session,
        course: &course,
        section: &section,
    };
    let module = module(&url, ModuleKind::Resource, "/mod/resource/view.php?id=10", "Lecture 3");
    let err = ResolverRegistry::default().resolve(&module, &ctx).await.unwrap_err();

    match err {
        AppError::Extraction { unit, page, .. } => {
            assert_eq!(unit, "Algorithms101 / Week 1 / Lecture 3");
            assert!(page.unwrap().contains("Hidden by the instructor"));
        }
        other => panic!("应为解析错误, 实际为 {:?}", other),
    }
}

#[tokio::test]
async fn test_folder_keeps_nested_directories() {
    let mut server = mockito::Server::new_async().await;
    let (session, _login) = session(&mut server).await;
    let _folder = mock_page(
        &mut server,
        "/mod/folder/view.php",
        &[("id", "10")],
        r#"<div id="region-main"><div class="foldertree">
             <a href="/pluginfile.php/44/mod_folder/content/3/readme.txt?forcedownload=1">readme.txt</a>
             <a href="/pluginfile.php/44/mod_folder/content/3/Labs/lab1.pdf?forcedownload=1">lab1.pdf</a>
           </div></div>"#,
    )
    .await;

    let url = server.url();
    let (course, section) = (course(&url), section());
    let ctx = ResolveContext {
        session: &session,
        course: &course,
        section: &section,
    };
    let module = module(&url, ModuleKind::Folder, "/mod/folder/view.php?id=10", "Lab material");
    let artifacts = ResolverRegistry::default().resolve(&module, &ctx).await.unwrap();

    let placed: Vec<PathBuf> = artifacts.iter().map(|a| a.subpath.join(&a.filename)).collect();
    assert_eq!(
        placed,
        vec![
            PathBuf::from("Lab material/readme.txt"),
            PathBuf::from("Lab material/Labs/lab1.pdf"),
        ]
    );
}

#[tokio::test]
async fn test_assignment_without_attachments_has_only_description() {
    let mut server = mockito::Server::new_async().await;
    let (session, _login) = session(&mut server).await;
    let _assign = mock_page(
        &mut server,
        "/mod/assign/view.php",
        &[("id", "10")],
        r#"<div id="region-main"><h2>Homework 1</h2><table class="submissionstatustable"><tr><td>No attempt</td></tr></table></div>"#,
    )
    .await;

    let url = server.url();
    let (course, section) = (course(&url), section());
    let ctx = ResolveContext {
        session: &session,
        course: &course,
        section: &section,
    };
    let module = module(&url, ModuleKind::Assignment, "/mod/assign/view.php?id=10", "Homework 1");
    let artifacts = ResolverRegistry::default().resolve(&module, &ctx).await.unwrap();

    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].filename, "description.txt");
    assert_eq!(artifacts[0].subpath, PathBuf::from("Homework 1"));
    match &artifacts[0].source {
        ArtifactSource::Inline(text) => assert_eq!(text, "Homework 1\n"),
        other => panic!("应为内联内容, 实际为 {:?}", other),
    }
}

#[tokio::test]
async fn test_unsupported_and_urlless_modules() {
    let mut server = mockito::Server::new_async().await;
    let (session, _login) = session(&mut server).await;

    let url = server.url();
    let (course, section) = (course(&url), section());
    let ctx = ResolveContext {
        session: &session,
        course: &course,
        section: &section,
    };
    let registry = ResolverRegistry::default();

    let forum = module(&url, ModuleKind::Unknown("forum".into()), "/mod/forum/view.php?id=1", "News");
    assert!(registry.resolve(&forum, &ctx).await.unwrap().is_empty());

    let mut no_url = module(&url, ModuleKind::Resource, "/", "Ghost");
    no_url.url = None;
    assert!(matches!(
        registry.resolve(&no_url, &ctx).await,
        Err(AppError::Extraction { .. })
    ));
}

#[tokio::test]
async fn test_enumerator_favorites_and_all_courses() {
    let mut server = mockito::Server::new_async().await;
    let (session, _login) = session(&mut server).await;
    let _dashboard = server
        .mock("GET", "/my/courses.php")
        .with_body(dashboard(&[("3", "History", false), ("2", "Algorithms101", true)]))
        .create_async()
        .await;
    let _profile = server
        .mock("GET", "/user/profile.php")
        .with_body(r#"<div class="profile_tree"><a href="/course/view.php?id=9">Databases</a></div>"#)
        .create_async()
        .await;

    let dashboard_pages = vec!["/my/courses.php".to_string()];
    let enrolled_pages = vec!["/user/profile.php".to_string()];
    let enumerator = CourseEnumerator::new(&session, &dashboard_pages, &enrolled_pages);

    let favorites = enumerator.enumerate(false).await.unwrap();
    assert_eq!(favorites.warning, None);
    let names: Vec<_> = favorites.courses.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Algorithms101"]);

    let all = enumerator.enumerate(true).await.unwrap();
    let names: Vec<_> = all.courses.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Algorithms101", "History", "Databases"]);
}

#[tokio::test]
async fn test_enumerator_skips_broken_pages() {
    let mut server = mockito::Server::new_async().await;
    let (session, _login) = session(&mut server).await;
    let _broken = server
        .mock("GET", "/my/courses.php")
        .with_status(500)
        .create_async()
        .await;
    let _profile = server
        .mock("GET", "/user/profile.php")
        .with_body(r#"<a href="/course/view.php?id=9">Databases</a>"#)
        .create_async()
        .await;

    let dashboard_pages = vec!["/my/courses.php".to_string()];
    let enrolled_pages = vec!["/user/profile.php".to_string()];
    let listing = CourseEnumerator::new(&session, &dashboard_pages, &enrolled_pages)
        .enumerate(false)
        .await
        .unwrap();

    assert_eq!(listing.warning, Some(EnumerationWarning::NoFavorites));
    assert_eq!(listing.courses.len(), 1);
    assert_eq!(listing.courses[0].id, "9");
}
