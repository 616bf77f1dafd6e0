//! AnkiWeb client
//!
//! AnkiWeb has no public API. Login goes through the website form, data
//! calls hit the JSON endpoints the web editor uses. Two cookies matter:
//! `ankiweb` on the main site and `ankiweb` on the editor domain.
//!
//! Data calls never follow redirects: AnkiWeb answers a stale cookie with a
//! redirect to the login page, which maps to `AuthorizationExpired`.

use super::traits::*;
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderValue, COOKIE};
use reqwest::{StatusCode, Url};
use scraper::{Html, Selector};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cookie name used on both domains
const COOKIE_NAME: &str = "ankiweb";

/// Marker preceding the card editor's CSRF token
const EDITOR_TOKEN_MARKER: &str = "new anki.Editor('";

pub const DEFAULT_WEB_URL: &str = "https://ankiweb.net";
pub const DEFAULT_USER_URL: &str = "https://ankiuser.net";

#[derive(Deserialize)]
struct AddInfo {
    decks: Vec<NamedId>,
    notetypes: Vec<NamedId>,
}

#[derive(Deserialize)]
struct NamedId {
    id: i64,
    name: String,
}

#[derive(Deserialize)]
struct NotetypeFields {
    fields: Vec<RawField>,
}

#[derive(Deserialize)]
struct RawField {
    name: String,
    ord: u32,
}

/// AnkiWeb account client
#[derive(Clone)]
pub struct AnkiWebClient {
    http: reqwest::Client,
    web_url: Url,
    user_url: Url,
    timeout: Duration,
}

impl AnkiWebClient {
    pub fn new(web_url: &str, user_url: &str, timeout: Duration) -> AccountResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AccountError::Network(e.to_string()))?;

        Ok(Self {
            http,
            web_url: parse_base(web_url)?,
            user_url: parse_base(user_url)?,
            timeout,
        })
    }

    fn web(&self, path: &str) -> AccountResult<Url> {
        self.web_url
            .join(path)
            .map_err(|e| AccountError::Protocol(e.to_string()))
    }

    fn user(&self, path: &str) -> AccountResult<Url> {
        self.user_url
            .join(path)
            .map_err(|e| AccountError::Protocol(e.to_string()))
    }
}

fn parse_base(url: &str) -> AccountResult<Url> {
    let mut normalized = url.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized).map_err(|e| AccountError::Protocol(format!("{}: {}", url, e)))
}

fn network(err: reqwest::Error) -> AccountError {
    AccountError::Network(err.to_string())
}

fn cookie_header(value: &str) -> AccountResult<HeaderValue> {
    HeaderValue::from_str(&format!("{}={}", COOKIE_NAME, value))
        .map_err(|e| AccountError::Protocol(e.to_string()))
}

/// Map a data-call status to an error, if any
fn check_status(status: StatusCode) -> AccountResult<()> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status.is_redirection()
    {
        Err(AccountError::AuthorizationExpired)
    } else if status.is_server_error() {
        Err(AccountError::Network(status.to_string()))
    } else {
        Err(AccountError::Protocol(status.to_string()))
    }
}

/// Value attribute of the `<input name="...">` element, entities decoded
fn extract_input_value(html: &str, name: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(&format!("input[name=\"{}\"]", name)).ok()?;
    document
        .select(&selector)
        .find_map(|input| input.value().attr("value"))
        .map(str::to_string)
}

/// CSRF token passed to the card editor from an inline script
fn extract_editor_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script").ok()?;
    document.select(&selector).find_map(|script| {
        let body: String = script.text().collect();
        let start = body.find(EDITOR_TOKEN_MARKER)? + EDITOR_TOKEN_MARKER.len();
        let end = start + body[start..].find("',")?;
        Some(body[start..end].to_string())
    })
}

/// Value of `name` in a `Cookie` header
fn cookie_value(header: &HeaderValue, name: &str) -> Option<String> {
    header.to_str().ok()?.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

#[async_trait]
impl AccountApi for AnkiWebClient {
    async fn authenticate(&self, email: &str, secret: &str) -> AccountResult<AccountSession> {
        info!(user = %email, "logging in to AnkiWeb");

        // Fresh jar per login so sessions of different chats never mix
        let jar = Arc::new(Jar::default());
        let login_http = reqwest::Client::builder()
            .timeout(self.timeout)
            .cookie_provider(jar.clone())
            .build()
            .map_err(network)?;

        let login_url = self.web("account/login")?;
        let page = login_http
            .get(login_url.clone())
            .send()
            .await
            .map_err(network)?;
        if !page.status().is_success() {
            return Err(AccountError::Network(format!(
                "login page returned {}",
                page.status()
            )));
        }
        let page = page.text().await.map_err(network)?;
        let csrf_token = extract_input_value(&page, "csrf_token")
            .ok_or_else(|| AccountError::Protocol("login form has no csrf_token".to_string()))?;

        let response = login_http
            .post(login_url)
            .form(&[
                ("username", email),
                ("password", secret),
                ("csrf_token", csrf_token.as_str()),
            ])
            .send()
            .await
            .map_err(network)?;
        if response.status().is_server_error() {
            return Err(AccountError::Network(response.status().to_string()));
        }

        let token = jar
            .cookies(&self.web_url)
            .and_then(|header| cookie_value(&header, COOKIE_NAME))
            .ok_or_else(|| AccountError::AuthFailed("credentials were not accepted".to_string()))?;
        debug!(user = %email, "main site cookie issued");

        let editor = login_http
            .get(self.user("edit/")?)
            .header(COOKIE, cookie_header(&token)?)
            .send()
            .await
            .map_err(network)?;
        if !editor.status().is_success() {
            return Err(AccountError::Protocol(format!(
                "editor page returned {}",
                editor.status()
            )));
        }
        let editor = editor.text().await.map_err(network)?;

        let usernet_token = jar
            .cookies(&self.user_url)
            .and_then(|header| cookie_value(&header, COOKIE_NAME))
            .ok_or_else(|| AccountError::Protocol("editor did not issue a cookie".to_string()))?;
        let card_token = extract_editor_token(&editor)
            .ok_or_else(|| AccountError::Protocol("editor page has no card token".to_string()))?;

        info!(user = %email, "AnkiWeb session established");
        Ok(AccountSession {
            username: email.to_string(),
            token,
            usernet_token,
            card_token,
        })
    }

    async fn list_decks_and_note_types(
        &self,
        session: &AccountSession,
    ) -> AccountResult<(Vec<DeckInfo>, Vec<NoteTypeInfo>)> {
        debug!(user = %session.username, "listing decks and note types");
        let response = self
            .http
            .get(self.user("edit/getAddInfo")?)
            .header(COOKIE, cookie_header(&session.token)?)
            .send()
            .await
            .map_err(network)?;
        check_status(response.status())?;

        let info: AddInfo = response
            .json()
            .await
            .map_err(|e| AccountError::Protocol(e.to_string()))?;

        let decks = info
            .decks
            .into_iter()
            .map(|d| DeckInfo {
                deck_id: d.id,
                deck_name: d.name,
            })
            .collect();
        let note_types = info
            .notetypes
            .into_iter()
            .map(|n| NoteTypeInfo {
                note_id: n.id,
                note_name: n.name,
            })
            .collect();
        Ok((decks, note_types))
    }

    async fn list_fields(
        &self,
        session: &AccountSession,
        note_type: &NoteTypeInfo,
    ) -> AccountResult<Vec<FieldInfo>> {
        debug!(user = %session.username, note_type = %note_type.note_name, "listing fields");
        let response = self
            .http
            .get(self.user("edit/getNotetypeFields")?)
            .query(&[("ntid", note_type.note_id)])
            .header(COOKIE, cookie_header(&session.usernet_token)?)
            .send()
            .await
            .map_err(network)?;
        check_status(response.status())?;

        let content: NotetypeFields = response
            .json()
            .await
            .map_err(|e| AccountError::Protocol(e.to_string()))?;
        Ok(content
            .fields
            .into_iter()
            .map(|f| FieldInfo {
                field_name: f.name,
                order: f.ord,
            })
            .collect())
    }

    async fn add_card(
        &self,
        session: &AccountSession,
        deck: &DeckInfo,
        note_type: &NoteTypeInfo,
        fields: &[FieldInfo],
        card: &CardContent,
    ) -> AccountResult<()> {
        info!(user = %session.username, deck = %deck.deck_name, "adding card");
        let payload = serde_json::json!([card.field_values(fields), ""]);
        let data = payload.to_string();
        let note_id = note_type.note_id.to_string();
        let deck_id = deck.deck_id.to_string();

        let response = self
            .http
            .post(self.user("edit/save")?)
            .form(&[
                ("nid", ""),
                ("data", data.as_str()),
                ("csrf_token", session.card_token.as_str()),
                ("mid", note_id.as_str()),
                ("deck", deck_id.as_str()),
            ])
            .header(COOKIE, cookie_header(&session.usernet_token)?)
            .send()
            .await
            .map_err(network)?;
        check_status(response.status())?;

        // The editor echoes the saved note back
        let echoed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AccountError::Protocol(e.to_string()))?;
        if echoed != payload {
            warn!(user = %session.username, "card save was not echoed back");
            return Err(AccountError::Protocol("card was not saved".to_string()));
        }
        Ok(())
    }

    async fn create_deck(&self, session: &AccountSession, name: &str) -> AccountResult<()> {
        info!(user = %session.username, deck = %name, "creating deck");
        let response = self
            .http
            .get(self.web("decks/create")?)
            .query(&[("name", name)])
            .header("x-requested-with", "XMLHttpRequest")
            .header(COOKIE, cookie_header(&session.token)?)
            .send()
            .await
            .map_err(network)?;
        check_status(response.status())
    }
}
