//! The board task owns the post service and is the only place the store is
//! touched. Connection handlers talk to it over a channel and get their
//! answer back on a oneshot.
use memorial_core::{
    auth::DeleteCredentials,
    post::{ClipSubmission, ImageUpload, MessageSubmission, PublicPost},
    service::{CreatedPost, PostService},
    MemorialError, MemorialResult, ResourceType,
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

/// Pending commands the board will queue before senders have to wait.
const BOARD_QUEUE: usize = 64;

/// Used to send the outcome of a command back to the connection handler.
pub type Responder<T> = oneshot::Sender<MemorialResult<T>>;

#[derive(Debug)]
pub enum BoardCommand {
    List {
        kind: ResourceType,
        resp: Responder<Vec<PublicPost>>,
    },
    Get {
        kind: ResourceType,
        id: String,
        resp: Responder<PublicPost>,
    },
    CreateClip {
        submission: ClipSubmission,
        resp: Responder<CreatedPost>,
    },
    CreateMessage {
        submission: MessageSubmission,
        resp: Responder<CreatedPost>,
    },
    Delete {
        kind: ResourceType,
        id: String,
        credentials: DeleteCredentials,
        resp: Responder<()>,
    },
    AttachImage {
        id: String,
        owner: String,
        upload: ImageUpload,
        resp: Responder<PublicPost>,
    },
}

/// Sending a response over a oneshot channel returns the input value
/// as the error, which only happens once the handler is gone. So, no point
/// in error handling thus this function.
fn respond<T>(responder: Responder<T>, result: MemorialResult<T>) {
    let _ = responder.send(result);
}

/// Start the board on a blocking thread; the sqlite store does blocking io.
/// The board stops once every [`BoardHandle`] is dropped.
pub fn spawn_board(service: PostService) -> (BoardHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(BOARD_QUEUE);
    let task = tokio::task::spawn_blocking(move || run_board(service, rx));
    (BoardHandle { tx }, task)
}

fn run_board(mut service: PostService, mut rx: mpsc::Receiver<BoardCommand>) {
    tracing::info!("Board running...");
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            BoardCommand::List { kind, resp } => respond(resp, service.list(kind)),
            BoardCommand::Get { kind, id, resp } => respond(resp, service.get(kind, &id)),
            BoardCommand::CreateClip { submission, resp } => {
                respond(resp, service.create_clip(submission))
            }
            BoardCommand::CreateMessage { submission, resp } => {
                respond(resp, service.create_message(submission))
            }
            BoardCommand::Delete {
                kind,
                id,
                credentials,
                resp,
            } => respond(resp, service.delete(kind, &id, &credentials)),
            BoardCommand::AttachImage {
                id,
                owner,
                upload,
                resp,
            } => respond(resp, service.attach_image(&id, &owner, upload)),
        }
    }
    tracing::info!("Board stopped");
}

/// Cheap to clone; every clone feeds the same board.
#[derive(Debug, Clone)]
pub struct BoardHandle {
    tx: mpsc::Sender<BoardCommand>,
}

impl BoardHandle {
    pub async fn list(&self, kind: ResourceType) -> MemorialResult<Vec<PublicPost>> {
        self.request(|resp| BoardCommand::List { kind, resp }).await
    }

    pub async fn get(&self, kind: ResourceType, id: String) -> MemorialResult<PublicPost> {
        self.request(|resp| BoardCommand::Get { kind, id, resp })
            .await
    }

    pub async fn create_clip(&self, submission: ClipSubmission) -> MemorialResult<CreatedPost> {
        self.request(|resp| BoardCommand::CreateClip { submission, resp })
            .await
    }

    pub async fn create_message(
        &self,
        submission: MessageSubmission,
    ) -> MemorialResult<CreatedPost> {
        self.request(|resp| BoardCommand::CreateMessage { submission, resp })
            .await
    }

    pub async fn delete(
        &self,
        kind: ResourceType,
        id: String,
        credentials: DeleteCredentials,
    ) -> MemorialResult<()> {
        self.request(|resp| BoardCommand::Delete {
            kind,
            id,
            credentials,
            resp,
        })
        .await
    }

    pub async fn attach_image(
        &self,
        id: String,
        owner: String,
        upload: ImageUpload,
    ) -> MemorialResult<PublicPost> {
        self.request(|resp| BoardCommand::AttachImage {
            id,
            owner,
            upload,
            resp,
        })
        .await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Responder<T>) -> BoardCommand,
    ) -> MemorialResult<T> {
        let (responder, receiver) = oneshot::channel();
        self.tx
            .send(command(responder))
            .await
            .map_err(|_| MemorialError::storage("board is not running"))?;
        receiver
            .await
            .map_err(|_| MemorialError::storage("board dropped the request"))?
    }
}
