// ABOUTME: Deployment state marker types for the type state pattern.
// ABOUTME: Zero-sized types enforce valid stage transitions at compile time.

/// Initial state: spec loaded, nothing run yet.
/// Available actions: `build()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Pending;

/// Artifact built: content-addressed reference in hand.
/// Available actions: `publish()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Built;

/// Artifact published: canonical repo-digest issued by the registry.
/// Available actions: `update()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Published;

/// Remote instance replaced: new instance started on the host.
/// Available actions: `verify()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Updated;

/// Health verified against the new instance.
/// Available actions: `finish()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Verified;
