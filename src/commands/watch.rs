use anyhow::Result;
use log::debug;

use crate::app::App;
use crate::message::{Message, Reply};
use crate::model::{RepoId, WatchLevel};
use crate::popup::render_rows;

use super::expect_reply;

/// Start watching a repository, or change its watch level
#[tracing::instrument(skip(app))]
pub async fn watch(app: &App, repo: &str, level: WatchLevel) -> Result<()> {
    let name: RepoId = repo.parse()?;
    let reply = app
        .bus
        .send(Message::ReplaceRepo {
            name: name.clone(),
            watching: level,
        })
        .await;

    match expect_reply(reply)? {
        Reply::Watched(Some(snapshot)) => {
            for row in render_rows(std::slice::from_ref(&snapshot)) {
                println!("{}", row);
            }
        }
        Reply::Watched(None) => println!("Stopped watching {}.", name),
        other => debug!("Unexpected reply {:?}", other),
    }
    Ok(())
}

/// Stop watching a repository
#[tracing::instrument(skip(app))]
pub async fn unwatch(app: &App, repo: &str) -> Result<()> {
    watch(app, repo, WatchLevel::None).await
}

/// Stop watching every repository
#[tracing::instrument(skip(app))]
pub async fn unwatch_all(app: &App) -> Result<()> {
    let removed = app.registry.remove_all().await?;
    println!("Stopped watching {} repositories.", removed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::open_app;
    use crate::model::ReleaseSnapshot;

    #[tokio::test]
    async fn test_watch_then_unwatch() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/octocat/Hello-World/releases/latest")
            .with_status(200)
            .with_body(r#"{"tag_name": "v1.0.0", "published_at": "2013-02-27T19:35:32Z"}"#)
            .create_async()
            .await;
        let (app, _dir) = open_app(&server.url()).await;

        watch(&app, "octocat/Hello-World", WatchLevel::Minor)
            .await
            .unwrap();

        let id: RepoId = "octocat/Hello-World".parse().unwrap();
        let stored = app.registry.get_snapshot(&id).await.unwrap().unwrap();
        assert_eq!(stored.tag_name, "v1.0.0");
        assert_eq!(stored.watching, WatchLevel::Minor);

        unwatch(&app, "octocat/Hello-World").await.unwrap();
        assert!(app.registry.list_watched().await.unwrap().is_empty());
        assert_eq!(app.registry.get_snapshot(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unwatch_all() {
        let server = mockito::Server::new_async().await;
        let (app, _dir) = open_app(&server.url()).await;
        for name in ["o/a", "o/b"] {
            app.registry
                .save(&ReleaseSnapshot::new(name.parse().unwrap(), WatchLevel::All))
                .await
                .unwrap();
        }

        unwatch_all(&app).await.unwrap();

        assert!(app.registry.list_watched().await.unwrap().is_empty());
        assert!(app.registry.get_all_snapshots().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_watch_rejects_bad_name() {
        let server = mockito::Server::new_async().await;
        let (app, _dir) = open_app(&server.url()).await;
        assert!(watch(&app, "not-a-repo", WatchLevel::All).await.is_err());
    }

    #[tokio::test]
    async fn test_watch_falls_back_to_feed() {
        let mut server = mockito::Server::new_async().await;
        let _api = server
            .mock("GET", "/repos/o/r/releases/latest")
            .with_status(403)
            .with_body(r#"{"message": "Resource not accessible"}"#)
            .create_async()
            .await;
        let _feed = server
            .mock("GET", "/o/r/releases.atom")
            .with_status(200)
            .with_body(
                r#"<feed><entry><id>tag:github.com,2008:Repository/1/v0.9.0</id></entry></feed>"#,
            )
            .create_async()
            .await;
        let (app, _dir) = open_app(&server.url()).await;

        watch(&app, "o/r", WatchLevel::All).await.unwrap();

        let stored = app
            .registry
            .get_snapshot(&"o/r".parse().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.tag_name, "v0.9.0");
        assert_eq!(stored.method, crate::model::FetchMethod::Feed);
    }
}
