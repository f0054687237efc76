use subtle::{Choice, ConstantTimeEq};

use crate::array::{read_uint, ComparisonType, ElementType};
use crate::heap::Heap;
use crate::{Array, Error, Result};

/// Outcome of comparing `a` with `b`.
///
/// Kept as masks so secret comparisons can combine outcomes without
/// branching on them. All three are clear for unordered floats.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Ordering {
    pub less: Choice,
    pub equal: Choice,
    pub greater: Choice,
}

impl Ordering {
    pub fn equal() -> Self {
        Ordering {
            less: Choice::from(0),
            equal: Choice::from(1),
            greater: Choice::from(0),
        }
    }

    /// Ordering of two unsigned integers, without branches.
    pub fn of_u64(x: u64, y: u64) -> Self {
        let (_, x_below) = x.overflowing_sub(y);
        let (_, y_below) = y.overflowing_sub(x);
        Ordering {
            less: Choice::from(x_below as u8),
            equal: x.ct_eq(&y),
            greater: Choice::from(y_below as u8),
        }
    }

    /// Lexicographic refinement: `next` only counts while everything so far was equal.
    fn then(self, next: Ordering) -> Self {
        let undecided = self.equal;
        Ordering {
            less: self.less | (undecided & next.less),
            equal: self.equal & next.equal,
            greater: self.greater | (undecided & next.greater),
        }
    }

    pub fn satisfies(self, compare_type: ComparisonType) -> Choice {
        use ComparisonType::*;
        match compare_type {
            Lt => self.less,
            Le => self.less | self.equal,
            Gt => self.greater,
            Ge => self.greater | self.equal,
            Equal => self.equal,
            NotEqual => !self.equal,
        }
    }
}

fn compare_element(element_type: ElementType, x: &[u8], y: &[u8]) -> Result<Ordering> {
    let size = x.len();
    match (element_type, size) {
        (ElementType::Uint, 1) | (ElementType::Uint, 2) | (ElementType::Uint, 4) | (ElementType::Uint, 8) => {
            Ok(Ordering::of_u64(read_uint(x), read_uint(y)))
        }
        (ElementType::Int, 1) | (ElementType::Int, 2) | (ElementType::Int, 4) | (ElementType::Int, 8) => {
            // sign-extend, then flip the sign bit so unsigned order is signed order
            let shift = 64 - 8 * size as u32;
            let widen = |bytes: &[u8]| (((read_uint(bytes) << shift) as i64 >> shift) as u64) ^ (1 << 63);
            Ok(Ordering::of_u64(widen(x), widen(y)))
        }
        (ElementType::Float, 4) => {
            let (x, y) = (f32::from_bits(read_uint(x) as u32), f32::from_bits(read_uint(y) as u32));
            Ok(Ordering {
                less: Choice::from((x < y) as u8),
                equal: Choice::from((x == y) as u8),
                greater: Choice::from((x > y) as u8),
            })
        }
        (ElementType::Double, 8) => {
            let (x, y) = (f64::from_bits(read_uint(x)), f64::from_bits(read_uint(y)));
            Ok(Ordering {
                less: Choice::from((x < y) as u8),
                equal: Choice::from((x == y) as u8),
                greater: Choice::from((x > y) as u8),
            })
        }
        _ => Err(Error::Mismatch("element size does not fit the element type")),
    }
}

impl Heap {
    /// Compare two arrays element by element.
    ///
    /// Arrays order lexicographically, a proper prefix being the smaller.
    /// For `Equal`/`NotEqual`, different lengths decide immediately.
    ///
    /// With `secret`, every element of the common prefix is examined and
    /// outcomes are merged with masks, so the work done depends on the
    /// lengths only. Without it, the scan stops at the first difference.
    #[allow(clippy::too_many_arguments)]
    pub fn compare(
        &self,
        compare_type: ComparisonType,
        element_type: ElementType,
        a: &Array,
        b: &Array,
        element_size: usize,
        has_sub_arrays: bool,
        secret: bool,
    ) -> Result<bool> {
        self.check_array(a, element_size, has_sub_arrays)?;
        self.check_array(b, element_size, has_sub_arrays)?;
        if a.num_elements != b.num_elements
            && (compare_type == ComparisonType::Equal || compare_type == ComparisonType::NotEqual)
        {
            return Ok(compare_type == ComparisonType::NotEqual);
        }
        let order = self.order(element_type, a, b, secret)?;
        Ok(bool::from(order.satisfies(compare_type)))
    }

    fn order(&self, element_type: ElementType, a: &Array, b: &Array, secret: bool) -> Result<Ordering> {
        let common = a.num_elements.min(b.num_elements);
        let mut order = Ordering::equal();

        if common > 0 {
            let (a_offset, a_header) = self.locate(a)?.ok_or(Error::StaleHandle)?;
            let (b_offset, b_header) = self.locate(b)?.ok_or(Error::StaleHandle)?;
            if a_header.element_size != b_header.element_size || a_header.has_sub_arrays != b_header.has_sub_arrays {
                return Err(Error::Mismatch("compared arrays differ in layout"));
            }
            let size = a_header.element_size;
            for index in 0..common {
                self.count_compare_step();
                let step = if a_header.has_sub_arrays {
                    let (x, y) = (self.read_handle(a_offset, index), self.read_handle(b_offset, index));
                    self.order(element_type, &x, &y, secret)?
                } else {
                    let bytes = self.all_bytes();
                    let x = &bytes[Self::byte_range(a_offset, index * size, (index + 1) * size)];
                    let y = &bytes[Self::byte_range(b_offset, index * size, (index + 1) * size)];
                    compare_element(element_type, x, y)?
                };
                order = order.then(step);
                if !secret && !bool::from(order.equal) {
                    return Ok(order);
                }
            }
        }

        // lengths are shape, not secret
        let by_length = Ordering::of_u64(a.num_elements as u64, b.num_elements as u64);
        Ok(order.then(by_length))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::array::ARRAY_HANDLE_BYTES;
    use crate::array::ComparisonType::*;

    fn bytes(heap: &mut Heap, values: &[u8]) -> Array {
        heap.array_from_bytes(values).unwrap()
    }

    #[test]
    fn six_orderings() {
        let mut heap = Heap::default();
        let a = bytes(&mut heap, &[1, 2, 3]);
        let b = bytes(&mut heap, &[1, 2, 4]);
        for secret in [false, true].iter().copied() {
            let check = |op| heap.compare(op, ElementType::Uint, &a, &b, 1, false, secret).unwrap();
            assert!(check(Lt));
            assert!(check(Le));
            assert!(!check(Gt));
            assert!(!check(Ge));
            assert!(!check(Equal));
            assert!(check(NotEqual));
        }
        assert!(heap.compare(Equal, ElementType::Uint, &a, &a, 1, false, true).unwrap());
        assert!(heap.compare(Ge, ElementType::Uint, &a, &a, 1, false, false).unwrap());
    }

    #[test]
    fn prefix_is_smaller() {
        let mut heap = Heap::default();
        let short = bytes(&mut heap, &[1, 2]);
        let long = bytes(&mut heap, &[1, 2, 3]);
        let empty = Array::empty();
        assert!(heap.compare(Lt, ElementType::Uint, &short, &long, 1, false, true).unwrap());
        assert!(heap.compare(Gt, ElementType::Uint, &long, &short, 1, false, false).unwrap());
        assert!(heap.compare(Lt, ElementType::Uint, &empty, &short, 1, false, false).unwrap());
        assert!(!heap.compare(Equal, ElementType::Uint, &short, &long, 1, false, true).unwrap());
        assert!(heap.compare(NotEqual, ElementType::Uint, &short, &long, 1, false, true).unwrap());
        // a difference before the end of the prefix wins over length
        let bigger = bytes(&mut heap, &[9]);
        assert!(heap.compare(Gt, ElementType::Uint, &bigger, &long, 1, false, true).unwrap());
    }

    #[test]
    fn signed_and_float_elements() {
        let mut heap = Heap::default();
        let minus_one = bytes(&mut heap, &[0xff]);
        let one = bytes(&mut heap, &[0x01]);
        assert!(heap.compare(Lt, ElementType::Int, &minus_one, &one, 1, false, true).unwrap());
        assert!(heap.compare(Gt, ElementType::Uint, &minus_one, &one, 1, false, true).unwrap());

        let nan_array = heap.allocate(1, 8, false).unwrap();
        heap.set_element(&nan_array, 0, f64::NAN.to_bits()).unwrap();
        for op in [Lt, Le, Gt, Ge, Equal].iter().copied() {
            assert!(!heap.compare(op, ElementType::Double, &nan_array, &nan_array, 8, false, false).unwrap());
        }
        assert!(heap.compare(NotEqual, ElementType::Double, &nan_array, &nan_array, 8, false, false).unwrap());
        assert!(heap.compare(Lt, ElementType::Float, &minus_one, &one, 1, false, false).is_err());
    }

    #[test]
    fn nested_compare_recurses() {
        let mut heap = Heap::default();
        let a = heap.array_of_strings(&[b"abc", b"x"]).unwrap();
        let b = heap.array_of_strings(&[b"abd"]).unwrap();
        assert!(heap.compare(Lt, ElementType::Uint, &a, &b, ARRAY_HANDLE_BYTES, true, true).unwrap());
        assert!(heap.compare(Gt, ElementType::Uint, &b, &a, ARRAY_HANDLE_BYTES, true, false).unwrap());
    }

    #[test]
    fn secret_compare_visits_every_element() {
        let mut heap = Heap::default();
        let base = bytes(&mut heap, &[0; 16]);
        let mut steps = Vec::new();
        for position in 0..16 {
            let mut other = [0u8; 16];
            other[position] = 1;
            let other = bytes(&mut heap, &other);

            let before = heap.stats().compare_steps;
            heap.compare(Lt, ElementType::Uint, &base, &other, 1, false, true).unwrap();
            steps.push(heap.stats().compare_steps - before);

            let before = heap.stats().compare_steps;
            heap.compare(Lt, ElementType::Uint, &base, &other, 1, false, false).unwrap();
            assert_eq!(heap.stats().compare_steps - before, position as u64 + 1);
        }
        assert!(steps.iter().all(|count| *count == 16));
    }
}
