// quire-common: document-model contract and wire types shared by the Quire crates

pub mod protocol;
pub mod step;
