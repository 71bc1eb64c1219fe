use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use grammers_client::message::Message;
use grammers_client::{Client, SenderPool, SignInError};
use grammers_mtsender::{ConnectionParams, FixedReconnect};
use grammers_session::storages::SqliteSession;
use grammers_session::types::PeerRef;
use grammers_session::updates::UpdatesLike;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::chat::{self, Selection};
use crate::config::Config;
use crate::download::{Downloader, Summary, Transfer};
use crate::error::{Abort, TransferError};
use crate::fetch_tg;
use crate::models::Conversation;
use crate::prompt::{Prompter, Reply};
use crate::tg_session;

/// Reconnect up to 5 times, 30 seconds apart.
static RECONNECT_POLICY: FixedReconnect = FixedReconnect {
    attempts: 5,
    delay: Duration::from_secs(30),
};

/// Holds a connected grammers client and its background runner handle.
pub struct TgConnection {
    pub client: Client,
    pub session: Arc<SqliteSession>,
    pub runner_handle: tokio::task::JoinHandle<()>,
    // Kept alive so the runner always has somewhere to push updates.
    _updates_rx: mpsc::UnboundedReceiver<UpdatesLike>,
}

impl TgConnection {
    pub fn disconnect(self) {
        self.client.disconnect();
        self.runner_handle.abort();
    }
}

/// Open the session for `config.session_id` and start a grammers client on it.
pub async fn connect(config: &Config, config_dir: &Path) -> Result<TgConnection> {
    let session = tg_session::open_session(config_dir, &config.session_id).await?;

    let sender_pool = SenderPool::with_configuration(
        Arc::clone(&session),
        config.api_id,
        ConnectionParams {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            device_model: "telegrab".to_string(),
            reconnection_policy: &RECONNECT_POLICY,
            ..Default::default()
        },
    );

    let SenderPool {
        runner,
        handle: fat_handle,
        updates,
    } = sender_pool;

    let client = Client::new(fat_handle);

    // Drives all MTProto I/O
    let runner_handle = tokio::spawn(async move {
        runner.run().await;
    });

    Ok(TgConnection {
        client,
        session,
        runner_handle,
        _updates_rx: updates,
    })
}

/// Reuse the stored session, or run the phone -> code -> optional 2FA login.
pub async fn authenticate<P: Prompter>(client: &Client, config: &Config, prompter: &mut P) -> Result<()> {
    if client.is_authorized().await.context("checking authorization")? {
        let me = client.get_me().await.context("getting current user")?;
        info!(user = %me.full_name(), "using stored session");
        return Ok(());
    }

    let phone = answer(prompter.text("Phone number (with country code, e.g. +380...):")?)?;
    info!(phone = %mask_phone(&phone), "requesting login code");
    let token = client
        .request_login_code(&phone, &config.api_hash)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("API_ID_INVALID") {
                anyhow::anyhow!("invalid Telegram API credentials, check api_id and api_hash in config")
            } else {
                anyhow::anyhow!(e).context("requesting login code")
            }
        })?;

    let code = answer(prompter.text("Login code sent via Telegram, enter it:")?)?;

    let user = match client.sign_in(&token, &code).await {
        Ok(user) => user,
        Err(SignInError::PasswordRequired(password_token)) => {
            let hint = password_token.hint().unwrap_or("none");
            info!(hint, "two-factor authentication required");
            let password =
                rpassword::prompt_password_stdout("Enter 2FA password: ").context("reading 2FA password")?;
            client
                .check_password(password_token, password.as_bytes())
                .await
                .map_err(|e| anyhow::anyhow!("2FA check failed: {e:?}"))?
        }
        Err(SignInError::InvalidCode) => anyhow::bail!("invalid verification code"),
        Err(other) => anyhow::bail!("sign-in failed: {other:?}"),
    };

    info!(user = %user.full_name(), "logged in, session saved");
    Ok(())
}

fn answer(reply: Reply<String>) -> Result<String, Abort> {
    match reply {
        Reply::Answer(text) => Ok(text.trim().to_string()),
        Reply::Cancelled => Err(Abort::Cancelled),
        Reply::Interrupted => Err(Abort::Interrupted { removed: None }),
    }
}

fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() > 4 {
        let head: String = chars.iter().take(4.min(chars.len() - 4)).collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}****{tail}")
    } else {
        "****".to_string()
    }
}

/// Dialogs as a lazy source of conversations, in the order the platform returns them.
fn dialogs(conn: &TgConnection) -> impl AsyncFnMut() -> Result<Option<Conversation<PeerRef>>> + '_ {
    let mut dialogs = conn.client.iter_dialogs();
    async move || -> Result<Option<Conversation<PeerRef>>> {
        let Some(dialog) = dialogs.next().await.context("iterating dialogs")? else {
            return Ok(None);
        };
        Ok(Some(fetch_tg::peer_to_conversation(dialog.peer(), conn.session.as_ref()).await))
    }
}

pub async fn list_conversations(conn: &TgConnection, cancel: &CancellationToken) -> Result<Vec<Conversation<PeerRef>>> {
    chat::collect(dialogs(conn), cancel).await
}

/// Match by name when given, falling back to the interactive chooser.
pub async fn select_conversation<P: Prompter>(
    conn: &TgConnection,
    name: Option<&str>,
    prompter: &mut P,
    cancel: &CancellationToken,
) -> Result<Selection<PeerRef>> {
    chat::select(name, dialogs(conn), prompter, cancel).await
}

/// Walk a chat's history newest-first and hand each message to the downloader.
pub async fn grab_history<P: Prompter>(
    client: &Client,
    chat: &Conversation<PeerRef>,
    downloader: &mut Downloader<'_, TgTransfer<'_>, P>,
    cancel: &CancellationToken,
) -> Result<Summary> {
    let mut messages = client.iter_messages(chat.peer.clone());

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Abort::Interrupted { removed: None }.into()),
            next = messages.next() => next.context("iterating message history")?,
        };
        let Some(msg) = next else {
            break;
        };
        let record = fetch_tg::message_to_record(&msg);
        downloader.handle(&record, &msg).await?;
    }

    Ok(downloader.summary())
}

/// Streams media to disk chunk by chunk so progress can be reported.
pub struct TgTransfer<'c> {
    client: &'c Client,
}

impl<'c> TgTransfer<'c> {
    pub fn new(client: &'c Client) -> Self {
        Self { client }
    }
}

impl Transfer for TgTransfer<'_> {
    type Handle = Message;

    async fn transfer(
        &self,
        message: &Message,
        target: &Path,
        expected: Option<u64>,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<(), TransferError> {
        let media = message
            .media()
            .ok_or_else(|| TransferError::Request("message has no media".to_string()))?;

        let mut download = self.client.iter_download(&media);
        let mut file = tokio::fs::File::create(target).await?;
        let mut received = 0u64;

        while let Some(chunk) = download
            .next()
            .await
            .map_err(|e| TransferError::Request(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            progress(received, expected);
        }
        file.flush().await?;

        Ok(())
    }
}
