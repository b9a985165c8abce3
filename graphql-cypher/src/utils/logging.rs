/// This macro is a wrapper around `tracing::trace!` and should not be confused with our snapshot
/// testing. Its goal is to attach serialized versions of the key data structures (compiled
/// statements, parameter maps, mutation events) to logging statements so that they can be
/// inspected when debugging a translation.
///
/// Pass the macro an identifier for the value you'd like to take a snapshot of. The snapshot is
/// tagged with the type name of the value and carries the value serialized to JSON. EX:
/// ```ignore
/// snapshot!(compiled, "compiled root field");
/// // Generates:
/// // trace!(snapshot = "CompiledOperation", data = "{ .. }", "compiled root field");
/// ```
macro_rules! snapshot {
    ($value:expr, $msg:literal) => {
        #[cfg(feature = "snapshot_tracing")]
        tracing::trace!(
            snapshot = std::any::type_name_of_val(&$value),
            data = serde_json::to_string(&$value).unwrap_or_default(),
            $msg
        );
    };
}

pub(crate) use snapshot;
