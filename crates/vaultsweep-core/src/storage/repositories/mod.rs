mod cipher_repository;

pub use cipher_repository::{CipherRepository, SqliteCipherRepository};

use crate::error::Result;

pub trait Repository {
    type Entity;
    type Id: ?Sized;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>>;
    fn save(&self, entity: &Self::Entity) -> Result<()>;
}
