use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::{
    cli::{Cli, Command},
    domain::{
        self,
        session::{Session, UserId},
        status::SessionSnapshot,
    },
    infra::{self, error::AppError, message_log::FileMessageStore},
    ui::{self, conversation_list},
    usecases::{
        self,
        bootstrap::{self, SessionComposition},
        context::AppContext,
        contracts::MessageStore,
        conversations::{
            load_conversations, load_thread, mark_conversation_read, send_message,
            ConversationsError,
        },
    },
};

const LINE_WIDTH: usize = 80;
const SESSION_REQUIRED: &str = "SESSION_REQUIRED";

pub fn run(cli: Cli) -> Result<()> {
    let context = bootstrap::bootstrap(cli.config.as_deref())?;

    tracing::debug!(
        ui = ui::module_name(),
        domain = domain::module_name(),
        usecases = usecases::module_name(),
        infra = infra::module_name(),
        "module boundaries loaded"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;

    let lines = runtime.block_on(execute(cli.command_or_default(), &context))?;
    for line in lines {
        println!("{line}");
    }

    Ok(())
}

/// Runs one command inside a started synchronizer and returns the lines to print.
async fn execute(command: Command, context: &AppContext) -> Result<Vec<String>> {
    let composition = bootstrap::compose_session(context);
    composition.synchronizer.start();
    let settled = composition.synchronizer.store().wait_until_settled().await;

    let result = match command {
        Command::Status => Ok(vec![conversation_list::render_status_line(&settled)]),
        Command::Login {
            user_id,
            name,
            expires_in,
        } => login(&composition, user_id, name, expires_in).await,
        Command::Refresh { expires_in } => refresh(&composition, expires_in),
        Command::Logout => Ok(logout(&composition).await),
        Command::Conversations { messages } => {
            let store = FileMessageStore::new(message_log_path(context, messages.as_deref()));
            list_conversations(&store, &settled).await
        }
        Command::Read { partner, messages } => {
            let store = FileMessageStore::new(message_log_path(context, messages.as_deref()));
            read_conversation(&store, &settled, &UserId::new(partner)).await
        }
        Command::Send { to, text, messages } => {
            let store = FileMessageStore::new(message_log_path(context, messages.as_deref()));
            send(&store, &settled, &UserId::new(to), &text).await
        }
    };

    composition.synchronizer.stop();
    result
}

async fn login(
    composition: &SessionComposition,
    user_id: String,
    name: String,
    expires_in: Option<u64>,
) -> Result<Vec<String>> {
    let mut session = Session::new(user_id, name);
    if let Some(seconds) = expires_in {
        session = session.with_expiry(expiry_from_now(seconds)?);
    }
    let expected_id = session.user_id.clone();
    let expected_name = session.display_name.clone();

    composition.backend.sign_in(session)?;

    // An earlier session may already be authenticated; wait for this one.
    let snapshot = composition
        .synchronizer
        .store()
        .wait_for(|snapshot| {
            snapshot.is_authenticated()
                && snapshot.current_session().is_some_and(|current| {
                    current.user_id == expected_id && current.display_name == expected_name
                })
        })
        .await;

    Ok(vec![conversation_list::render_status_line(&snapshot)])
}

fn refresh(composition: &SessionComposition, expires_in: Option<u64>) -> Result<Vec<String>> {
    let expires_at = expires_in.map(expiry_from_now).transpose()?;

    match composition.backend.refresh(expires_at)? {
        Some(_) => Ok(vec![
            conversation_list::render_status_line(&composition.synchronizer.snapshot()),
            "Session token refreshed.".to_owned(),
        ]),
        None => Ok(vec!["No stored session to refresh.".to_owned()]),
    }
}

fn expiry_from_now(seconds: u64) -> Result<i64> {
    let now = chrono::Utc::now().timestamp_millis();
    i64::try_from(seconds)
        .ok()
        .and_then(|seconds| seconds.checked_mul(1_000))
        .and_then(|millis| now.checked_add(millis))
        .ok_or_else(|| anyhow::anyhow!("session lifetime of {seconds}s is out of range"))
}

async fn logout(composition: &SessionComposition) -> Vec<String> {
    let outcome = composition.synchronizer.sign_out().await;

    let mut lines = vec![conversation_list::render_status_line(
        &composition.synchronizer.snapshot(),
    )];
    if !outcome.backend_acknowledged {
        lines.push("Local session cleared; the backend did not confirm sign-out.".to_owned());
    }
    lines
}

async fn list_conversations(
    store: &dyn MessageStore,
    snapshot: &SessionSnapshot,
) -> Result<Vec<String>> {
    let session = signed_in(snapshot)?;
    let output = load_conversations(store, session)
        .await
        .map_err(conversations_error)?;

    let mut lines = conversation_list::render_conversation_lines(&output.summaries, LINE_WIDTH);
    lines.push(format!("Unread: {}", output.total_unread));
    Ok(lines)
}

async fn read_conversation(
    store: &dyn MessageStore,
    snapshot: &SessionSnapshot,
    partner: &UserId,
) -> Result<Vec<String>> {
    let session = signed_in(snapshot)?;

    let thread = load_thread(store, session, partner)
        .await
        .map_err(conversations_error)?;
    let thread: Vec<_> = thread.iter().collect();

    let mut lines = conversation_list::render_thread_lines(&thread, &session.user_id, LINE_WIDTH);
    let changed = mark_conversation_read(store, session, partner)
        .await
        .map_err(conversations_error)?;
    lines.push(format!("Marked {changed} message(s) as read."));
    Ok(lines)
}

async fn send(
    store: &dyn MessageStore,
    snapshot: &SessionSnapshot,
    partner: &UserId,
    text: &str,
) -> Result<Vec<String>> {
    let session = signed_in(snapshot)?;
    let message = send_message(store, session, partner, text)
        .await
        .map_err(conversations_error)?;

    Ok(conversation_list::render_thread_lines(
        &[&message],
        &session.user_id,
        LINE_WIDTH,
    ))
}

fn signed_in(snapshot: &SessionSnapshot) -> Result<&Session> {
    match snapshot.current_session() {
        Some(session) if snapshot.is_authenticated() => Ok(session),
        _ => {
            tracing::warn!(
                code = SESSION_REQUIRED,
                status = snapshot.status.as_label(),
                "messages requested without a session"
            );
            bail!("{SESSION_REQUIRED}: sign in with `hente login` first")
        }
    }
}

fn conversations_error(error: ConversationsError) -> anyhow::Error {
    let message = match error {
        ConversationsError::Unauthorized => "the message store refused this session",
        ConversationsError::TemporarilyUnavailable => "the message store is unavailable; try again",
        ConversationsError::DataContractViolation => "the message store returned invalid data",
    };
    anyhow::anyhow!(message)
}

fn message_log_path(context: &AppContext, override_path: Option<&Path>) -> PathBuf {
    override_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| context.config.messages.path.clone())
}
