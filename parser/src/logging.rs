use std::fmt::Write;

/// Leveled logger shared by the recognizers.
///
/// Level 0 is silent, 1 emits warnings, 2 emits informational messages.
/// Messages at or below `buffer_level` are kept in memory (see
/// [`Logger::get_and_clear_logs`]), messages at or below `stderr_level`
/// are echoed to stderr.
pub struct Logger {
    effective_level: u32,
    buffer_level: u32,
    stderr_level: u32,
    buffer: String,
}

impl Clone for Logger {
    fn clone(&self) -> Self {
        Self {
            effective_level: self.effective_level,
            buffer_level: self.buffer_level,
            stderr_level: self.stderr_level,
            buffer: String::new(), // clean logs on clone
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Logger::new(0, 1)
    }
}

impl Logger {
    pub fn new(buffer_level: u32, stderr_level: u32) -> Self {
        Self {
            buffer_level,
            stderr_level,
            effective_level: std::cmp::max(buffer_level, stderr_level),
            buffer: String::new(),
        }
    }

    pub fn warn(&mut self, s: &str) {
        if self.level_enabled(1) {
            self.write_warning("Warning: ");
            self.write_at(1, s);
            self.write_at(1, "\n");
        }
    }

    pub fn info(&mut self, s: &str) {
        if self.level_enabled(2) {
            self.write_at(2, s);
            self.write_at(2, "\n");
        }
    }

    #[inline(always)]
    pub fn level_enabled(&self, level: u32) -> bool {
        level <= self.effective_level
    }

    #[inline(always)]
    pub fn effective_level(&self) -> u32 {
        self.effective_level
    }

    #[inline(always)]
    pub fn buffer_level(&self) -> u32 {
        self.buffer_level
    }

    #[inline(always)]
    pub fn stderr_level(&self) -> u32 {
        self.stderr_level
    }

    pub fn set_buffer_level(&mut self, buffer_level: u32) {
        self.buffer_level = buffer_level;
        self.effective_level = std::cmp::max(self.stderr_level, self.buffer_level);
    }

    pub fn set_stderr_level(&mut self, stderr_level: u32) {
        self.stderr_level = stderr_level;
        self.effective_level = std::cmp::max(self.stderr_level, self.buffer_level);
    }

    pub fn get_buffer(&self) -> &str {
        &self.buffer
    }

    pub fn get_and_clear_logs(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }

    pub fn info_logger(&mut self) -> LevelWriter<'_> {
        LevelWriter {
            logger: self,
            level: 2,
        }
    }

    pub fn warning_logger(&mut self) -> LevelWriter<'_> {
        LevelWriter {
            logger: self,
            level: 1,
        }
    }

    pub fn write_warning(&mut self, s: &str) {
        self.write_at(1, s);
    }

    fn write_at(&mut self, level: u32, s: &str) {
        if level <= self.buffer_level {
            self.buffer.push_str(s);
        }
        if level <= self.stderr_level {
            eprint!("{}", s);
        }
    }
}

/// Writer handed out by [`Logger::info_logger`] and
/// [`Logger::warning_logger`]; used by the `infoln!` and `warn!` macros.
pub struct LevelWriter<'a> {
    logger: &'a mut Logger,
    level: u32,
}

impl Write for LevelWriter<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.logger.write_at(self.level, s);
        Ok(())
    }
}

impl Write for Logger {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.write_at(2, s);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_by_level() {
        let mut logger = Logger::new(1, 0);
        logger.info("not kept");
        logger.warn("kept");
        assert_eq!(logger.get_and_clear_logs(), "Warning: kept\n");
        assert_eq!(logger.get_buffer(), "");

        logger.set_buffer_level(2);
        logger.info("now kept");
        assert_eq!(logger.get_buffer(), "now kept\n");
    }
}
