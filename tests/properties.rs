use proptest::prelude::*;
use sandbox_runtime::{smallnum, Array, ComparisonType, Config, ElementType, Error, Heap, ARRAY_HANDLE_BYTES};

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn bigint(heap: &mut Heap, value: u64, width: usize, signed: bool, secret: bool) -> Array {
    let mut x = Array::empty();
    heap.integer_to_bigint(&mut x, value, width, signed, secret).unwrap();
    x
}

proptest! {
    #[test]
    fn little_endian_round_trip(bytes in prop::collection::vec(any::<u8>(), 1..64)) {
        let mut heap = Heap::default();
        let source = heap.array_from_bytes(&bytes).unwrap();
        let (mut x, mut out) = (Array::empty(), Array::empty());
        heap.decode_little_endian(&mut x, &source, 8 * bytes.len(), false, false).unwrap();
        heap.encode_little_endian(&mut out, &x).unwrap();
        prop_assert_eq!(heap.bytes(&out).unwrap(), &bytes[..]);
    }
}

proptest! {
    #[test]
    fn big_endian_round_trip(bytes in prop::collection::vec(any::<u8>(), 1..64), secret in any::<bool>()) {
        let mut heap = Heap::default();
        let source = heap.array_from_bytes(&bytes).unwrap();
        let (mut x, mut out) = (Array::empty(), Array::empty());
        heap.decode_big_endian(&mut x, &source, 8 * bytes.len(), false, secret).unwrap();
        heap.encode_big_endian(&mut out, &x).unwrap();
        prop_assert_eq!(heap.bytes(&out).unwrap(), &bytes[..]);

        // the two byte orders mirror each other
        heap.encode_little_endian(&mut out, &x).unwrap();
        let mut reversed = bytes.clone();
        reversed.reverse();
        prop_assert_eq!(heap.bytes(&out).unwrap(), &reversed[..]);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(cases()))]

    #[test]
    fn compaction_preserves_contents(
        contents in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..40), 1..24),
        keep in prop::collection::vec(any::<bool>(), 24),
    ) {
        let mut heap = Heap::default();
        let mut arrays: Vec<Array> = contents.iter().map(|bytes| heap.array_from_bytes(bytes).unwrap()).collect();
        for (array, keep) in arrays.iter_mut().zip(keep.iter()) {
            if !keep {
                heap.free(array).unwrap();
            }
        }

        heap.compact();
        heap.verify_heap().unwrap();
        for ((array, bytes), keep) in arrays.iter().zip(contents.iter()).zip(keep.iter()) {
            if *keep {
                prop_assert_eq!(heap.bytes(array).unwrap(), &bytes[..]);
            } else {
                prop_assert!(array.is_empty());
            }
        }

        let roots: Vec<&Array> = arrays.iter().collect();
        let survivors = arrays.iter().filter(|array| !array.is_empty()).count();
        prop_assert_eq!(heap.verify_roots(&roots).unwrap(), survivors);
        prop_assert!(heap.stats().live_words <= heap.stats().heap_words);
    }
}

proptest! {
    #[test]
    fn secrecy_is_contagious(a in any::<u64>(), b in any::<u64>(), a_secret in any::<bool>(), b_secret in any::<bool>()) {
        let mut heap = Heap::default();
        let x = bigint(&mut heap, a, 64, false, a_secret);
        let y = bigint(&mut heap, b, 64, false, b_secret);
        let mut out = Array::empty();

        heap.bigint_add_trunc(&mut out, &x, &y).unwrap();
        prop_assert_eq!(heap.bigint_secret(&out).unwrap(), a_secret || b_secret);
        prop_assert_eq!(heap.bigint_to_integer(&out).unwrap(), a.wrapping_add(b));

        heap.bigint_mul_trunc(&mut out, &x, &y).unwrap();
        prop_assert_eq!(heap.bigint_secret(&out).unwrap(), a_secret || b_secret);
        prop_assert_eq!(heap.bigint_to_integer(&out).unwrap(), a.wrapping_mul(b));

        heap.bigint_xor(&mut out, &x, &y).unwrap();
        prop_assert_eq!(heap.bigint_secret(&out).unwrap(), a_secret || b_secret);

        heap.bigint_shl(&mut out, &x, 3).unwrap();
        prop_assert_eq!(heap.bigint_secret(&out).unwrap(), a_secret);
    }
}

proptest! {
    #[test]
    fn secret_comparison_examines_every_element(
        pair in (1usize..48).prop_flat_map(|len| (
            prop::collection::vec(any::<u8>(), len),
            prop::collection::vec(any::<u8>(), len),
        )),
    ) {
        let (a, b) = pair;
        let mut heap = Heap::default();
        let (x, y) = (heap.array_from_bytes(&a).unwrap(), heap.array_from_bytes(&b).unwrap());
        let before = heap.stats().compare_steps;
        let less = heap.compare(ComparisonType::Lt, ElementType::Uint, &x, &y, 1, false, true).unwrap();
        prop_assert_eq!(heap.stats().compare_steps - before, a.len() as u64);
        prop_assert_eq!(less, a < b);
    }
}

proptest! {
    #[test]
    fn checked_signed_arithmetic_agrees(a in any::<i64>(), b in any::<i64>()) {
        let mut heap = Heap::default();
        let x = bigint(&mut heap, a as u64, 64, true, false);
        let y = bigint(&mut heap, b as u64, 64, true, true);
        let mut out = Array::empty();

        match a.checked_add(b) {
            Some(sum) => {
                heap.bigint_add(&mut out, &x, &y).unwrap();
                prop_assert_eq!(heap.bigint_to_integer(&out).unwrap() as i64, sum);
            }
            None => prop_assert_eq!(heap.bigint_add(&mut out, &x, &y), Err(Error::Overflow)),
        }
        match a.checked_mul(b) {
            Some(product) => {
                heap.bigint_mul(&mut out, &x, &y).unwrap();
                prop_assert_eq!(heap.bigint_to_integer(&out).unwrap() as i64, product);
            }
            None => prop_assert_eq!(heap.bigint_mul(&mut out, &x, &y), Err(Error::Overflow)),
        }
        if b != 0 && !(a == i64::MIN && b == -1) {
            heap.bigint_div(&mut out, &x, &y).unwrap();
            prop_assert_eq!(heap.bigint_to_integer(&out).unwrap() as i64, a / b);
            heap.bigint_mod(&mut out, &x, &y).unwrap();
            prop_assert_eq!(heap.bigint_to_integer(&out).unwrap() as i64, a % b);

            prop_assert_eq!(smallnum::div(a as u64, b as u64, true, true).unwrap() as i64, a / b);
            prop_assert_eq!(smallnum::rem(a as u64, b as u64, true, false).unwrap() as i64, a % b);
        }
        prop_assert_eq!(
            heap.compare_bigints(ComparisonType::Lt, &x, &y).unwrap(),
            a < b
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(cases()))]

    #[test]
    fn modular_inverse_agrees_with_gcd(m in 1u64..500, x in 0u64..1000, secret in any::<bool>()) {
        let mut heap = Heap::default();
        let source = bigint(&mut heap, x, 16, false, secret);
        let modulus = bigint(&mut heap, m, 16, false, false);
        let mut inverse = Array::empty();

        let invertible = heap.modular_inverse(&mut inverse, &source, &modulus).unwrap();
        prop_assert_eq!(invertible, gcd(x % m, m) == 1);
        if invertible {
            let r = heap.bigint_to_integer(&inverse).unwrap();
            prop_assert!(r < m);
            prop_assert_eq!((x * r) % m, 1 % m);
            prop_assert_eq!(smallnum::modular_div(1, x, m, secret).unwrap(), r);
        } else {
            prop_assert_eq!(smallnum::modular_div(1, x, m, secret), Err(Error::NotInvertible));
        }
    }
}

#[derive(Clone, Debug)]
enum Step {
    Push(Vec<u8>),
    Extend(usize, Vec<u8>),
    Resize(usize, usize),
    Drop(usize),
    ResizeOuter(usize),
    Garbage(usize),
    FreeGarbage(usize),
    Compact,
    Mirror,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..24).prop_map(Step::Push),
        (any::<usize>(), prop::collection::vec(any::<u8>(), 1..24)).prop_map(|(i, bytes)| Step::Extend(i, bytes)),
        (any::<usize>(), 0usize..48).prop_map(|(i, len)| Step::Resize(i, len)),
        any::<usize>().prop_map(Step::Drop),
        (0usize..12).prop_map(Step::ResizeOuter),
        (1usize..40).prop_map(Step::Garbage),
        any::<usize>().prop_map(Step::FreeGarbage),
        Just(Step::Compact),
        Just(Step::Mirror),
    ]
}

fn cases() -> u32 {
    if cfg!(feature = "extended-testing") {
        4096
    } else {
        128
    }
}

fn contents(heap: &mut Heap, outer: &Array) -> Vec<Vec<u8>> {
    (0..outer.len())
        .map(|i| {
            let child = heap.take_sub_array(outer, i).unwrap();
            let bytes = heap.bytes(&child).unwrap().to_vec();
            heap.put_sub_array(outer, i, child).unwrap();
            bytes
        })
        .collect()
}

/// Run `change` on nested array `i`, taken out of `outer` and put back afterwards.
fn with_child(heap: &mut Heap, outer: &Array, i: usize, change: impl FnOnce(&mut Heap, &mut Array)) {
    let mut child = heap.take_sub_array(outer, i).unwrap();
    change(heap, &mut child);
    heap.put_sub_array(outer, i, child).unwrap();
}

fn apply(heap: &mut Heap, outer: &mut Array, garbage: &mut Vec<Array>, model: &mut Vec<Vec<u8>>, step: Step) {
    match step {
        Step::Push(bytes) => {
            let child = heap.array_from_bytes(&bytes).unwrap();
            heap.append_array(outer, child).unwrap();
            model.push(bytes);
        }
        Step::Extend(i, bytes) if !model.is_empty() => {
            let i = i % model.len();
            with_child(heap, outer, i, |heap, child| {
                if bytes.len() < 4 {
                    for byte in bytes.iter() {
                        heap.append(child, &[*byte], 1).unwrap();
                    }
                } else {
                    let mut extra = heap.array_from_bytes(&bytes).unwrap();
                    heap.concat(child, &extra, 1, false).unwrap();
                    heap.free(&mut extra).unwrap();
                }
            });
            model[i].extend_from_slice(&bytes);
        }
        Step::Resize(i, len) if !model.is_empty() => {
            let i = i % model.len();
            with_child(heap, outer, i, |heap, child| heap.resize(child, len, 1, false).unwrap());
            model[i].resize(len, 0);
        }
        Step::Drop(i) if !model.is_empty() => {
            let i = i % model.len();
            with_child(heap, outer, i, |heap, child| heap.free(child).unwrap());
            model[i].clear();
        }
        Step::ResizeOuter(len) => {
            heap.resize(outer, len, ARRAY_HANDLE_BYTES, true).unwrap();
            model.resize(len, Vec::new());
        }
        Step::Garbage(len) => garbage.push(heap.array_from_bytes(&vec![0xa5; len]).unwrap()),
        Step::FreeGarbage(k) if !garbage.is_empty() => {
            let mut array = garbage.remove(k % garbage.len());
            heap.free(&mut array).unwrap();
        }
        Step::Compact => heap.compact(),
        Step::Mirror => {
            let mut mirror = Array::empty();
            heap.copy(&mut mirror, outer, ARRAY_HANDLE_BYTES, true).unwrap();
            assert_eq!(contents(heap, &mirror), *model);
            heap.free(&mut mirror).unwrap();
        }
        _ => {}
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(cases()))]

    #[test]
    fn nested_arrays_survive_any_history(steps in prop::collection::vec(step(), 1..64)) {
        // starts small so that growth, compaction and relocation all happen
        let mut heap = Heap::new(Config { initial_words: 32, max_words: 1 << 16 });
        let mut outer = Array::empty();
        let mut garbage = Vec::new();
        let mut model: Vec<Vec<u8>> = Vec::new();

        for step in steps {
            apply(&mut heap, &mut outer, &mut garbage, &mut model, step);

            heap.verify_heap().unwrap();
            let mut roots = vec![&outer];
            roots.extend(garbage.iter());
            let stats = heap.stats();
            prop_assert_eq!(heap.verify_roots(&roots).unwrap(), stats.allocations - stats.frees);
            prop_assert_eq!(&contents(&mut heap, &outer), &model);
        }
    }
}
