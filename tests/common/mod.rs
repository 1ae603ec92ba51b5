pub(crate) mod logging;

pub(crate) mod network;

pub(crate) mod node;

pub(crate) mod normal_case;
