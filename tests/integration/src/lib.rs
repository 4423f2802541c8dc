//! End-to-end scenarios for `ds-client`. All tests live under `tests/`.
