//! Analog rangefinder with sample averaging.

use super::{DeviceError, RangeSensor};

/// A single-channel ADC reading in volts.
///
/// embedded-hal 1.0 has no ADC trait, so boards implement this one.
pub trait AnalogInput {
    type Error: core::fmt::Debug;

    fn read_voltage(&mut self) -> Result<f32, Self::Error>;
}

/// Rangefinder on an analog input, reporting the mean of `samples` reads.
pub struct Rangefinder<A> {
    input: A,
    samples: u8,
    last: f32,
}

impl<A: AnalogInput> Rangefinder<A> {
    /// `samples` of zero is treated as one.
    pub fn new(
        input: A,
        samples: u8,
    ) -> Self {
        Self {
            input,
            samples: samples.max(1),
            last: 0.0,
        }
    }

    pub fn read_average(&mut self) -> Result<f32, DeviceError<A::Error>> {
        let mut sum = 0.0;
        for _ in 0..self.samples {
            sum += self.input.read_voltage().map_err(DeviceError::AdcError)?;
        }
        Ok(sum / self.samples as f32)
    }

    pub fn release(self) -> A {
        self.input
    }
}

impl<A: AnalogInput> RangeSensor for Rangefinder<A> {
    /// Falls back to the last good average if the ADC fails.
    fn average_voltage(&mut self) -> f32 {
        match self.read_average() {
            Ok(v) => {
                self.last = v;
                v
            }
            Err(e) => {
                tracing::error!("Rangefinder read failed: {:?}", e);
                self.last
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedAdc<'a> {
        readings: &'a [Result<f32, ()>],
        next: usize,
    }

    impl AnalogInput for ScriptedAdc<'_> {
        type Error = ();

        fn read_voltage(&mut self) -> Result<f32, ()> {
            let r = self.readings[self.next];
            self.next += 1;
            r
        }
    }

    #[test]
    fn averages_samples() {
        let readings = [Ok(1.0), Ok(2.0), Ok(3.0), Ok(2.0)];
        let mut rf = Rangefinder::new(
            ScriptedAdc {
                readings: &readings,
                next: 0,
            },
            4,
        );
        assert_eq!(rf.average_voltage(), 2.0);
        assert_eq!(rf.release().next, 4);
    }

    #[test]
    fn zero_samples_reads_once() {
        let readings = [Ok(1.5)];
        let mut rf = Rangefinder::new(
            ScriptedAdc {
                readings: &readings,
                next: 0,
            },
            0,
        );
        assert_eq!(rf.average_voltage(), 1.5);
    }

    #[test]
    fn failed_read_keeps_last_good_value() {
        let readings = [Ok(2.0), Ok(2.0), Ok(5.0), Err(())];
        let mut rf = Rangefinder::new(
            ScriptedAdc {
                readings: &readings,
                next: 0,
            },
            2,
        );
        assert_eq!(rf.average_voltage(), 2.0);
        // 5.0 is read, then the ADC fails mid-average.
        assert_eq!(rf.average_voltage(), 2.0);
        assert_eq!(rf.release().next, 4);
    }

    #[test]
    fn read_average_surfaces_adc_errors() {
        let readings = [Err(())];
        let mut rf = Rangefinder::new(
            ScriptedAdc {
                readings: &readings,
                next: 0,
            },
            1,
        );
        assert!(matches!(rf.read_average(), Err(DeviceError::AdcError(()))));
    }
}
