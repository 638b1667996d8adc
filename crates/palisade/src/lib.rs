//! Client core of the palisade content-trust system
//!
//! For a named collection (GUN), a [`Collection`] maintains locally
//! signed TUF metadata, a durable journal of pending mutations, and a
//! publish pipeline against a remote notary server that holds the
//! authoritative copies plus the server-managed timestamp role.
//!
//! The typical lifecycle:
//!
//! ```no_run
//! use palisade::{Collection, KeyAlgorithm, Target};
//!
//! # async fn example() -> palisade::Result<()> {
//! let mut collection =
//!     Collection::new("~/.palisade", "docker.io/library/app", "https://notary.example.com")?;
//!
//! // Once per collection: mint a root key and initialize.
//! let key_id = collection.gen_root_key(KeyAlgorithm::Ecdsa, "passphrase")?;
//! let mut signer = collection.root_signer(&key_id, "passphrase")?;
//! collection.initialize(&mut signer).await?;
//!
//! // Journal content and publish.
//! let target = Target::from_file("app/v1", "./app-v1.tar")?;
//! collection.add_target(&target)?;
//! collection.publish(|| Ok("passphrase".to_string())).await?;
//!
//! for target in collection.list_targets().await? {
//!     println!("{} ({} bytes)", target.name, target.length);
//! }
//! # Ok(())
//! # }
//! ```

pub mod changelist;
pub mod collection;
pub mod error;
pub mod target;

pub use changelist::{Action, Change, ChangeIter, FileChangelist, TYPE_TARGET};
pub use collection::{Collection, CollectionBuilder, KEYS_DIR, TRUST_DIR, TUF_DIR};
pub use error::{Error, ErrorKind, Result};
pub use target::Target;

pub use palisade_custody::Signer;
pub use palisade_types::KeyAlgorithm;
