mod cloud_roundtrip;
mod control_loop;
