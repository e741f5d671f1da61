use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};
use memorial_core::{
    config::MemorialConfig,
    constant::{ADMIN_HEADER, IMAGE_FIELD, OWNER_HEADER},
    feed::{compose_feed, FeedItem},
    post::{ClipSubmission, MessageSubmission, PublicPost},
    vault::CredentialVault,
    video::{Preview, PreviewResolver},
    ResourceType,
};
use serde::{de::DeserializeOwned, Serialize};
use server::routes::{AttachResponse, CreateResponse, ErrorResponse, ListResponse};
use std::{
    io::{Read, Write},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(author, version, about, long_about=None)]
struct Cli {
    #[arg(short, long, value_name = "FILE")]
    /// Path to config file; defaults to ~/.memorial/memorial.toml
    config: Option<PathBuf>,

    #[arg(short, long)]
    /// Base url of the memorial server; defaults to the configured socket
    server: Option<String>,

    #[arg(long, value_name = "FILE")]
    /// Where owner credentials are kept; defaults to ~/.memorial/vault.json
    vault: Option<PathBuf>,

    #[command(subcommand)]
    command: MemorialCommand,
}

#[derive(Subcommand, Clone, Debug)]
enum MemorialCommand {
    /// Share a clip with a `title` and a link to it
    NewClip {
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        url: Option<String>,
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Leave a message on the board
    NewMessage {
        #[arg(short, long)]
        body: Option<String>,
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Everything on the board, newest first
    Feed {
        #[arg(short, long, action = ArgAction::SetTrue)]
        /// Select if the output should be json
        json: bool,
        #[arg(short, long, action = ArgAction::SetTrue)]
        /// Look up a preview for every clip
        previews: bool,
    },

    /// Remove one of your posts, or any post with the admin secret
    Delete {
        /// clips or messages
        kind: ResourceType,
        id: String,
        #[arg(long)]
        admin: Option<String>,
    },

    /// Attach a picture to one of your messages
    AttachImage {
        id: String,
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Resolve the embed and thumbnail of a clip link
    Preview { reference: String },
}

struct Client {
    http: reqwest::Client,
    base: String,
}

impl Client {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base.trim_end_matches('/'), path)
    }

    async fn list(&self, kind: ResourceType) -> anyhow::Result<Vec<PublicPost>> {
        let resp = self.http.get(self.url(kind.collection())).send().await?;
        Ok(read_response::<ListResponse>(resp).await?.items)
    }

    async fn create(
        &self,
        kind: ResourceType,
        submission: &impl Serialize,
    ) -> anyhow::Result<CreateResponse> {
        let resp = self
            .http
            .post(self.url(kind.collection()))
            .json(submission)
            .send()
            .await?;
        read_response(resp).await
    }

    async fn preview(&self, id: &str) -> anyhow::Result<Preview> {
        let resp = self
            .http
            .get(self.url(&format!("clips/{id}/preview")))
            .send()
            .await?;
        read_response(resp).await
    }
}

/// Decode a success body, or turn the server's error payload into an error.
async fn read_response<T: DeserializeOwned>(resp: reqwest::Response) -> anyhow::Result<T> {
    let status = resp.status();
    if status.is_success() {
        return resp.json::<T>().await.context("Unexpected response from server");
    }
    let msg = match resp.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    bail!("{msg} ({status})")
}

fn prompt_line(label: &str) -> anyhow::Result<String> {
    print!("{label}: ");
    std::io::stdout().flush()?;
    let mut buf = String::new();
    std::io::stdin()
        .read_line(&mut buf)
        .with_context(|| format!("Unable to read {label}"))?;
    Ok(buf.trim().to_string())
}

fn prompt_body() -> anyhow::Result<String> {
    println!("Enter message (Press Ctrl-d on new line to end): ");
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Unable to read message")?;
    Ok(buf.trim().to_string())
}

async fn new_post(
    client: &Client,
    vault: &mut CredentialVault,
    kind: ResourceType,
    submission: &impl Serialize,
) -> anyhow::Result<()> {
    let response = client.create(kind, submission).await?;
    let item = &response.created.item;
    vault.insert(kind, &item.id, response.created.owner_credential.as_str());
    vault.save().context("Post created but its credential could not be saved")?;
    println!("{item}");
    println!("Posted {kind} {}", item.id);
    Ok(())
}

async fn feed(
    client: &Client,
    vault: &CredentialVault,
    json: bool,
    previews: bool,
) -> anyhow::Result<()> {
    let (clips, messages) = tokio::try_join!(
        client.list(ResourceType::Clip),
        client.list(ResourceType::Message)
    )?;
    let feed = compose_feed(clips, messages);

    if json {
        println!("{}", serde_json::to_string_pretty(&feed)?);
        return Ok(());
    }
    if feed.is_empty() {
        println!("Nothing posted yet.");
    }
    for item in feed.iter() {
        print_item(client, vault, item, previews).await;
    }
    Ok(())
}

async fn print_item(client: &Client, vault: &CredentialVault, item: &FeedItem, previews: bool) {
    println!("{item}");
    if vault.owns(item.kind, &item.post.id) {
        println!("(yours; delete with `delete {} {}`)", item.kind.collection(), item.post.id);
    }
    if previews && item.kind == ResourceType::Clip {
        match client.preview(&item.post.id).await {
            Ok(preview) => print_preview(&preview),
            Err(e) => println!("Preview unavailable: {e}"),
        }
    }
    println!();
}

fn print_preview(preview: &Preview) {
    if !preview.available {
        println!("Preview unavailable");
        return;
    }
    if let Some(embed) = &preview.embed_url {
        println!("embed: {embed}");
    }
    if let Some(thumbnail) = &preview.thumbnail_url {
        println!("thumbnail: {thumbnail}");
    }
}

/// Content type from the file extension; the server only takes images.
fn image_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

async fn attach_image(
    client: &Client,
    vault: &CredentialVault,
    id: &str,
    file: &Path,
) -> anyhow::Result<()> {
    let Some(owner) = vault.get(ResourceType::Message, id) else {
        bail!("Only the creator of this message can attach a picture.");
    };
    let Some(content_type) = image_content_type(file) else {
        bail!("{:?} does not look like a png, jpeg, gif or webp image", file);
    };
    let bytes = std::fs::read(file).with_context(|| format!("Unable to read {:?}", file))?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| IMAGE_FIELD.to_string());
    let part = reqwest::multipart::Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(content_type)?;
    let form = reqwest::multipart::Form::new().part(IMAGE_FIELD, part);

    let resp = client
        .http
        .post(client.url(&format!("messages/{id}/image")))
        .header(OWNER_HEADER, owner)
        .multipart(form)
        .send()
        .await?;
    let attached = read_response::<AttachResponse>(resp).await?;
    println!("{}", attached.message);
    println!("Attached picture to message {id}");
    Ok(())
}

async fn delete(
    client: &Client,
    vault: &mut CredentialVault,
    kind: ResourceType,
    id: &str,
    admin: Option<String>,
) -> anyhow::Result<()> {
    let owner = vault.get(kind, id).map(String::from);
    if owner.is_none() && admin.is_none() {
        bail!("This post can only be removed by its creator.");
    }

    let mut request = client
        .http
        .delete(client.url(kind.collection()))
        .query(&[("id", id)]);
    if let Some(owner) = &owner {
        request = request.header(OWNER_HEADER, owner);
    }
    if let Some(admin) = &admin {
        request = request.header(ADMIN_HEADER, admin);
    }
    let resp = request.send().await?;
    let gone = resp.status() == reqwest::StatusCode::NOT_FOUND;
    let result = read_response::<serde_json::Value>(resp).await;

    if (result.is_ok() || gone) && vault.remove(kind, id).is_some() {
        vault.save()?;
    }
    result?;
    println!("Removed {kind} {id}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = MemorialConfig::load(cli.config.as_deref())?;
    let vault_path = cli.vault.unwrap_or_else(CredentialVault::default_path);
    let mut vault = CredentialVault::load(&vault_path);
    let client = Client {
        http: reqwest::Client::new(),
        base: cli
            .server
            .unwrap_or_else(|| format!("http://{}", config.socket)),
    };

    match cli.command {
        MemorialCommand::NewClip { title, url, name } => {
            let submission = ClipSubmission {
                title: title.map_or_else(|| prompt_line("Clip title"), Ok)?,
                video_reference: url.map_or_else(|| prompt_line("Clip url"), Ok)?,
                author_display_name: name,
            };
            new_post(&client, &mut vault, ResourceType::Clip, &submission).await
        }
        MemorialCommand::NewMessage { body, name } => {
            let submission = MessageSubmission {
                author_display_name: name,
                body: body.map_or_else(prompt_body, Ok)?,
            };
            new_post(&client, &mut vault, ResourceType::Message, &submission).await
        }
        MemorialCommand::Feed { json, previews } => feed(&client, &vault, json, previews).await,
        MemorialCommand::Delete { kind, id, admin } => {
            delete(&client, &mut vault, kind, &id, admin).await
        }
        MemorialCommand::AttachImage { id, file } => {
            attach_image(&client, &vault, &id, &file).await
        }
        MemorialCommand::Preview { reference } => {
            let resolver = PreviewResolver::new(config.preview_timeout(), config.public_host)?;
            print_preview(&resolver.resolve(&reference).await);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_content_type() {
        assert_eq!(image_content_type(Path::new("me.PNG")), Some("image/png"));
        assert_eq!(image_content_type(Path::new("a/b.jpeg")), Some("image/jpeg"));
        assert_eq!(image_content_type(Path::new("notes.txt")), None);
        assert_eq!(image_content_type(Path::new("noext")), None);
    }
}
