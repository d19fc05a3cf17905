//! CLI command implementations

use std::path::PathBuf;

use clap::Subcommand;
use driftfs_core::{
    DfsClient, DfsError, DownloadRange, DownloadTarget, FileId, MetaData, Result, SetMetadataFlag,
    UploadMode, UploadOptions, UploadSource,
};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Upload a local file and print its file id
    Upload {
        /// Path of the file to upload
        file: PathBuf,
        /// Group to store into; omitted lets the tracker choose
        #[arg(short, long)]
        group: Option<String>,
        /// Extension override; defaults to the file's own extension
        #[arg(long)]
        ext: Option<String>,
        /// Create the file appendable so it can be appended or modified later
        #[arg(long)]
        appendable: bool,
    },
    /// Download a file by id
    Download {
        /// File id as group/remote-filename
        file_id: String,
        /// Output path; omitted writes to stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Byte offset to start from
        #[arg(long, default_value = "0")]
        offset: u64,
        /// Number of bytes to fetch, zero meaning to the end
        #[arg(long, default_value = "0")]
        length: u64,
    },
    /// Append a local file to an appendable file
    Append {
        /// File id as group/remote-filename
        file_id: String,
        /// Path of the content to append
        file: PathBuf,
    },
    /// Overwrite a range of an appendable file
    Modify {
        /// File id as group/remote-filename
        file_id: String,
        /// Byte offset where the new content starts
        offset: u64,
        /// Path of the replacement content
        file: PathBuf,
    },
    /// Truncate an appendable file
    Truncate {
        /// File id as group/remote-filename
        file_id: String,
        /// Size in bytes to truncate to
        #[arg(default_value = "0")]
        size: u64,
    },
    /// Delete a stored file
    Delete {
        /// File id as group/remote-filename
        file_id: String,
    },
    /// Show size, creation time, crc32, and source of a file
    Info {
        /// File id as group/remote-filename
        file_id: String,
    },
    /// Print the metadata attached to a file
    MetaGet {
        /// File id as group/remote-filename
        file_id: String,
    },
    /// Attach metadata to a file
    MetaSet {
        /// File id as group/remote-filename
        file_id: String,
        /// Metadata entries as key=value
        #[arg(required = true)]
        entries: Vec<String>,
        /// Merge with existing metadata instead of replacing it
        #[arg(long)]
        merge: bool,
    },
    /// List every group in the cluster
    Groups,
    /// List the storage servers of one group
    Storages {
        /// Group name
        group: String,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(client: &DfsClient, command: Commands) -> Result<()> {
    match command {
        Commands::Upload {
            file,
            group,
            ext,
            appendable,
        } => upload(client, file, group, ext, appendable).await,
        Commands::Download {
            file_id,
            output,
            offset,
            length,
        } => download(client, &file_id, output, offset, length).await,
        Commands::Append { file_id, file } => append(client, &file_id, file).await,
        Commands::Modify {
            file_id,
            offset,
            file,
        } => modify(client, &file_id, offset, file).await,
        Commands::Truncate { file_id, size } => {
            client.truncate(&file_id.parse()?, size).await?;
            println!("Truncated {file_id} to {size} bytes");
            Ok(())
        }
        Commands::Delete { file_id } => {
            client.delete(&file_id.parse()?).await?;
            println!("Deleted {file_id}");
            Ok(())
        }
        Commands::Info { file_id } => info(client, &file_id).await,
        Commands::MetaGet { file_id } => meta_get(client, &file_id).await,
        Commands::MetaSet {
            file_id,
            entries,
            merge,
        } => meta_set(client, &file_id, entries, merge).await,
        Commands::Groups => groups(client).await,
        Commands::Storages { group } => storages(client, &group).await,
    }
}

async fn upload(
    client: &DfsClient,
    file: PathBuf,
    group: Option<String>,
    ext: Option<String>,
    appendable: bool,
) -> Result<()> {
    let mode = if appendable {
        UploadMode::CreateAppendable
    } else {
        UploadMode::Create
    };
    let options = UploadOptions { group, ext, mode };

    let file_id = client.upload(UploadSource::path(&file), options).await?;
    println!("{file_id}");
    Ok(())
}

async fn download(
    client: &DfsClient,
    file_id: &str,
    output: Option<PathBuf>,
    offset: u64,
    length: u64,
) -> Result<()> {
    let file_id: FileId = file_id.parse()?;
    let range = DownloadRange { offset, length };
    let target = match &output {
        Some(path) => DownloadTarget::Path(path.clone()),
        None => DownloadTarget::Writer(Box::new(tokio::io::stdout())),
    };

    client.download(&file_id, range, target).await?;
    if let Some(path) = output {
        println!("Downloaded {file_id} to {}", path.display());
    }
    Ok(())
}

async fn append(client: &DfsClient, file_id: &str, file: PathBuf) -> Result<()> {
    let file_id: FileId = file_id.parse()?;
    let options = UploadOptions {
        mode: UploadMode::Append {
            file_id: file_id.clone(),
        },
        ..Default::default()
    };

    client.upload(UploadSource::path(&file), options).await?;
    println!("Appended {} to {file_id}", file.display());
    Ok(())
}

async fn modify(client: &DfsClient, file_id: &str, offset: u64, file: PathBuf) -> Result<()> {
    let file_id: FileId = file_id.parse()?;
    let options = UploadOptions {
        mode: UploadMode::Modify {
            file_id: file_id.clone(),
            offset,
        },
        ..Default::default()
    };

    client.upload(UploadSource::path(&file), options).await?;
    println!("Modified {file_id} at offset {offset}");
    Ok(())
}

async fn info(client: &DfsClient, file_id: &str) -> Result<()> {
    let info = client.file_info(&file_id.parse()?).await?;
    println!("Size: {} bytes", info.size);
    println!("Created: {}", info.created);
    println!("CRC32: {:08x}", info.crc32);
    println!("Source: {}", info.source_addr);
    Ok(())
}

async fn meta_get(client: &DfsClient, file_id: &str) -> Result<()> {
    let meta = client.get_metadata(&file_id.parse()?).await?;
    if meta.is_empty() {
        println!("No metadata");
    }
    for (key, value) in meta {
        println!("{key}={value}");
    }
    Ok(())
}

async fn meta_set(
    client: &DfsClient,
    file_id: &str,
    entries: Vec<String>,
    merge: bool,
) -> Result<()> {
    let mut meta = MetaData::new();
    for entry in &entries {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| DfsError::Configuration {
                reason: format!("metadata entry '{entry}' must be key=value"),
            })?;
        meta.insert(key.to_string(), value.to_string());
    }

    let flag = if merge {
        SetMetadataFlag::Merge
    } else {
        SetMetadataFlag::Overwrite
    };
    client.set_metadata(&file_id.parse()?, &meta, flag).await?;
    println!("Set {} metadata entries on {file_id}", entries.len());
    Ok(())
}

async fn groups(client: &DfsClient) -> Result<()> {
    let groups = client.list_groups().await?;
    if groups.is_empty() {
        println!("No groups");
        return Ok(());
    }

    println!("Groups ({}):", groups.len());
    for group in groups {
        println!(
            "  {} total {} MB, free {} MB, {} storages ({} active), port {}",
            group.name,
            group.total_mb,
            group.free_mb,
            group.storage_count,
            group.active_count,
            group.storage_port,
        );
    }
    Ok(())
}

async fn storages(client: &DfsClient, group: &str) -> Result<()> {
    let storages = client.list_storages(group).await?;
    if storages.is_empty() {
        println!("No storages in group {group}");
        return Ok(());
    }

    println!("Storages in {group} ({}):", storages.len());
    for storage in storages {
        println!(
            "  {}:{} {:?} total {} MB, free {} MB, uploads {}/{}, joined {}",
            storage.ip_addr,
            storage.storage_port,
            storage.status,
            storage.total_mb,
            storage.free_mb,
            storage.upload.success,
            storage.upload.total,
            storage.join_time,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_entry_parsing() {
        let mut meta = MetaData::new();
        for entry in ["width=1024", "author=mike"] {
            let (key, value) = entry.split_once('=').unwrap();
            meta.insert(key.to_string(), value.to_string());
        }
        assert_eq!(meta.get("width").map(String::as_str), Some("1024"));
        assert_eq!(meta.get("author").map(String::as_str), Some("mike"));
    }

    #[test]
    fn test_file_id_argument_parsing() {
        let file_id: FileId = "group1/M00/00/00/abc.png".parse().unwrap();
        assert_eq!(file_id.group(), "group1");
        assert_eq!(file_id.remote_filename(), "M00/00/00/abc.png");

        assert!("missing-slash".parse::<FileId>().is_err());
    }
}
