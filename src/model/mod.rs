pub(crate) mod background;
pub(crate) mod composition;
pub(crate) mod image;
pub(crate) mod layer;
pub(crate) mod session;
