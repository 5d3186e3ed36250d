use anyhow::Context;
use blog_tonic_core::{
    proto::{
        Blog, CreateBlogRequest, DeleteBlogRequest, ListBlogRequest, ReadBlogRequest,
        UpdateBlogRequest, blog_service_client::BlogServiceClient,
    },
    types::DEFAULT_ENDPOINT,
};
use clap::Parser;
use tonic::{codec::CompressionEncoding, transport::Channel};
use tracing_subscriber::EnvFilter;

/// Drives one blog through create, read, update and delete.
#[derive(Parser, Debug)]
#[command(name = "blog-tonic-client", version, about = "Example client for the blog service")]
struct Args {
    /// Server endpoint.
    ///
    /// Environment variable: `BLOG_ENDPOINT`
    #[arg(long, env = "BLOG_ENDPOINT", default_value_t = String::from(DEFAULT_ENDPOINT))]
    endpoint: String,

    /// Stream every stored blog before deleting the one just created.
    #[arg(long, default_value_t = false)]
    list: bool,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args = Args::parse();

    println!("Blog Client");

    let mut client = BlogServiceClient::connect(args.endpoint.clone())
        .await
        .with_context(|| format!("could not dial {}", args.endpoint))?
        .accept_compressed(CompressionEncoding::Zstd);
    tracing::debug!("Connected to {}", args.endpoint);

    // === Create ===
    let created = client
        .create_blog(CreateBlogRequest {
            blog: Some(Blog::draft(
                "xans",
                "My First Blog",
                "Content of the first blog",
            )),
        })
        .await
        .context("unexpected error while creating")?
        .into_inner()
        .blog
        .context("create response carried no blog")?;
    anyhow::ensure!(created.is_persisted(), "server did not assign an id");
    println!("Blog has been created successfully: {created:?}");

    // === Read ===
    let read = client
        .read_blog(ReadBlogRequest {
            blog_id: created.id.clone(),
        })
        .await
        .context("error happened while reading")?
        .into_inner();
    println!("Blog was read: {read:?}");

    // === Update ===
    let edited = Blog {
        id: created.id.clone(),
        author_id: "Changed Author".to_string(),
        title: "My First Blog (edited)".to_string(),
        content: "Content which Updated".to_string(),
    };
    let updated = client
        .update_blog(UpdateBlogRequest {
            blog: Some(edited.clone()),
        })
        .await
        .context("error happened while updating")?
        .into_inner()
        .blog
        .context("update response carried no blog")?;
    anyhow::ensure!(
        updated.same_fields(&edited),
        "server returned {updated:?} instead of the edited blog"
    );
    println!("Blog was updated: {updated:?}");

    if args.list {
        list_blogs(&mut client).await?;
    }

    // === Delete ===
    let deleted = client
        .delete_blog(DeleteBlogRequest {
            blog_id: created.id.clone(),
        })
        .await
        .context("error happened while deleting")?
        .into_inner();
    println!("Blog was deleted: {deleted:?}");

    Ok(())
}

async fn list_blogs(client: &mut BlogServiceClient<Channel>) -> anyhow::Result<()> {
    let mut stream = client
        .list_blog(ListBlogRequest {})
        .await
        .context("error happened while listing")?
        .into_inner();

    let mut count = 0usize;
    while let Some(resp) = stream
        .message()
        .await
        .context("list stream failed")?
    {
        if let Some(blog) = resp.blog {
            println!("  {blog:?}");
            count += 1;
        }
    }
    println!("Listed {count} blogs");
    Ok(())
}
