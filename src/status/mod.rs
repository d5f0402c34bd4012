pub mod aggregate;
pub mod poller;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;
