//! In-memory `ArticleApi` used by controller and form tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::ArticleId,
    protocol::{Article, ArticleWrite, Health, SearchHit, LIST_LIMIT},
};
use tokio::sync::Semaphore;

use crate::{error::GatewayError, gateway::ArticleApi};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List,
    Get(ArticleId),
    Create(ArticleWrite),
    Update(ArticleId, ArticleWrite),
    Delete(ArticleId),
    Search(String),
    Health,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Get,
    Create,
    Update,
    Delete,
    Search,
    Health,
}

#[derive(Default)]
struct Script {
    articles: Vec<Article>,
    hits: Vec<SearchHit>,
    calls: Vec<Call>,
    failures: HashMap<Op, GatewayError>,
    gates: HashMap<Op, Arc<Semaphore>>,
    next_id: i64,
}

#[derive(Default)]
pub struct ScriptedApi {
    script: Mutex<Script>,
}

pub fn article(id: i64, title: &str) -> Article {
    Article {
        id: ArticleId(id),
        title: title.to_string(),
        content: format!("{title} content"),
        author: Some("ana".into()),
        category: None,
        published_at: Some("2024-01-01T00:00:00+00:00".into()),
    }
}

pub fn hit(id: i64, title: &str, score: Option<f64>) -> SearchHit {
    SearchHit {
        score,
        distance: score.map(|s| 1.0 / s - 1.0),
        article: article(id, title),
    }
}

impl ScriptedApi {
    pub fn with_articles(articles: Vec<Article>) -> Arc<Self> {
        let next_id = articles.iter().map(|a| a.id.0).max().unwrap_or(0) + 1;
        Arc::new(Self {
            script: Mutex::new(Script {
                articles,
                next_id,
                ..Script::default()
            }),
        })
    }

    pub fn set_hits(&self, hits: Vec<SearchHit>) {
        self.script.lock().expect("script").hits = hits;
    }

    pub fn fail(&self, op: Op, err: GatewayError) {
        self.script.lock().expect("script").failures.insert(op, err);
    }

    pub fn heal(&self, op: Op) {
        self.script.lock().expect("script").failures.remove(&op);
    }

    /// Calls of `op` block after being recorded until `release` is called.
    pub fn hold(&self, op: Op) {
        self.script
            .lock()
            .expect("script")
            .gates
            .insert(op, Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, op: Op) {
        if let Some(gate) = self.script.lock().expect("script").gates.remove(&op) {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().expect("script").calls.clone()
    }

    pub fn articles(&self) -> Vec<Article> {
        self.script.lock().expect("script").articles.clone()
    }

    /// Yields until at least `count` calls have been recorded.
    pub async fn wait_for_calls(&self, count: usize) {
        for _ in 0..1_000 {
            if self.calls().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("expected {count} calls, saw {:?}", self.calls());
    }

    async fn enter(&self, op: Op, call: Call) -> Result<(), GatewayError> {
        let gate = {
            let mut script = self.script.lock().expect("script");
            script.calls.push(call);
            script.gates.get(&op).cloned()
        };
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate").forget();
        }
        match self.script.lock().expect("script").failures.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn not_found() -> GatewayError {
        GatewayError::Http {
            status: 404,
            message: "Article not found".into(),
        }
    }
}

fn stored(id: ArticleId, body: &ArticleWrite) -> Article {
    Article {
        id,
        title: body.title.clone(),
        content: body.content.clone(),
        author: body.author.clone(),
        category: body.category.clone(),
        published_at: body.published_at.clone(),
    }
}

#[async_trait]
impl ArticleApi for ScriptedApi {
    async fn list_articles(&self) -> Result<Vec<Article>, GatewayError> {
        self.enter(Op::List, Call::List).await?;
        let script = self.script.lock().expect("script");
        Ok(script
            .articles
            .iter()
            .take(LIST_LIMIT as usize)
            .cloned()
            .collect())
    }

    async fn get_article(&self, id: ArticleId) -> Result<Article, GatewayError> {
        self.enter(Op::Get, Call::Get(id)).await?;
        let script = self.script.lock().expect("script");
        script
            .articles
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(Self::not_found)
    }

    async fn create_article(&self, body: &ArticleWrite) -> Result<Article, GatewayError> {
        self.enter(Op::Create, Call::Create(body.clone())).await?;
        let mut script = self.script.lock().expect("script");
        let id = ArticleId(script.next_id);
        script.next_id += 1;
        let article = stored(id, body);
        script.articles.insert(0, article.clone());
        Ok(article)
    }

    async fn update_article(
        &self,
        id: ArticleId,
        body: &ArticleWrite,
    ) -> Result<Article, GatewayError> {
        self.enter(Op::Update, Call::Update(id, body.clone())).await?;
        let mut script = self.script.lock().expect("script");
        let slot = script
            .articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(Self::not_found)?;
        *slot = stored(id, body);
        Ok(slot.clone())
    }

    async fn delete_article(&self, id: ArticleId) -> Result<(), GatewayError> {
        self.enter(Op::Delete, Call::Delete(id)).await?;
        let mut script = self.script.lock().expect("script");
        let before = script.articles.len();
        script.articles.retain(|a| a.id != id);
        if script.articles.len() == before {
            return Err(Self::not_found());
        }
        Ok(())
    }

    async fn search_articles(&self, query: &str) -> Result<Vec<SearchHit>, GatewayError> {
        self.enter(Op::Search, Call::Search(query.to_string()))
            .await?;
        Ok(self.script.lock().expect("script").hits.clone())
    }

    async fn health(&self) -> Result<Health, GatewayError> {
        self.enter(Op::Health, Call::Health).await?;
        Ok(Health { ok: true })
    }
}
