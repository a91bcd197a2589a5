use attendance_protocol::Tick;

/// 0.6 s per tick.
pub const TICKS_PER_MINUTE: Tick = 100;

/// Whether an autosave is due. `interval_minutes == 0` disables autosave.
pub fn should_autosave(current_tick: Tick, last_autosave_tick: Tick, interval_minutes: u32) -> bool {
    if interval_minutes == 0 {
        return false;
    }
    let interval_ticks = Tick::from(interval_minutes) * TICKS_PER_MINUTE;
    current_tick.saturating_sub(last_autosave_tick) >= interval_ticks
}
