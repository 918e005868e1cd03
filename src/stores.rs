//! Adapters for built-in and external transactional stores.
//!
//! ## Built-in Stores
//!
//! - [`null`]: accepts every operation and stores nothing.
//! - [`memory`]: an ordered in-memory store with buffered writes.
//!
//! ## Configuration Format
//!
//! A store is selected in the `[store]` section of the configuration by its registered `name`.
//! Every other key of the section is handed to the store's constructor:
//!
//! ```toml
//! [store]
//! name = "memory"
//! abort_chance = 5
//! ```
//!
//! ## Registering New Stores
//!
//! To benchmark a store from another crate, implement [`TxStore`]/[`TxStoreHandle`] for it and
//! write a constructor function with a signature of `fn(&toml::Table) -> Result<Box<dyn TxStore>>`.
//! Then register the constructor (along with its name) using [`inventory`]:
//! `inventory::submit! { Registry::new("name", constructor_fn) };`.

use crate::{Error, Result, TxStore};
use hashbrown::HashMap;
use log::debug;
use serde::Deserialize;
use toml::Table;

/// The centralized registry that maps the name of a store to its constructor function.
pub struct Registry<'a> {
    pub(crate) name: &'a str,
    constructor: fn(&Table) -> Result<Box<dyn TxStore>>,
}

impl<'a> Registry<'a> {
    pub const fn new(name: &'a str, constructor: fn(&Table) -> Result<Box<dyn TxStore>>) -> Self {
        Self { name, constructor }
    }
}

inventory::collect!(Registry<'static>);

/// The `[store]` section: a registered name plus the options of that store.
#[derive(Deserialize, Clone, Debug)]
pub(crate) struct StoreOpt {
    name: String,
    #[serde(flatten)]
    opt: Table,
}

/// Names of every registered store.
pub fn registered() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = inventory::iter::<Registry>
        .into_iter()
        .map(|r| r.name)
        .collect();
    names.sort();
    names
}

pub(crate) fn new_store(opt: &StoreOpt) -> Result<Box<dyn TxStore>> {
    let mut registered: HashMap<&'static str, fn(&Table) -> Result<Box<dyn TxStore>>> =
        HashMap::new();
    for r in inventory::iter::<Registry> {
        debug!("Adding supported store: {}", r.name);
        assert!(
            registered.insert(r.name, r.constructor).is_none(),
            "store {} registered twice",
            r.name
        );
    }
    let f = registered
        .get(opt.name.as_str())
        .ok_or_else(|| Error::UnknownStore(opt.name.clone()))?;
    f(&opt.opt)
}

pub mod memory;
pub mod null;
