pub(crate) mod event_hub;
