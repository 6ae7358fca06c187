use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_inpainting_requires_mask() {
    let image = test_image(4, 4);
    let result = Filter::Inpainting { smoothing_passes: 0 }.apply(&image, None);
    assert!(matches!(result, Err(FilterError::InvalidFilterParameters(_))));
}

#[test]
fn test_removes_scratch_from_flat_background() {
    let background = [90, 140, 30, 255];
    let scratched = Image::from_fn(12, 8, |x, y| if y == 4 && (2..10).contains(&x) { BLACK } else { background }).unwrap();
    let region = Mask::from_fn(12, 8, |x, y| y == 4 && (2..10).contains(&x));
    let out = Filter::Inpainting { smoothing_passes: 3 }.apply(&scratched, Some(&region)).unwrap();
    assert_eq!(out, Image::filled(12, 8, background).unwrap());
}

#[test]
fn test_fill_stays_between_boundary_colours() {
    let image = Image::from_fn(10, 1, |x, _| if x < 5 { [0, 0, 0, 255] } else { [200, 200, 200, 255] }).unwrap();
    let region = Mask::from_fn(10, 1, |x, _| (3..7).contains(&x));
    let out = Filter::Inpainting { smoothing_passes: 4 }.apply(&image, Some(&region)).unwrap();
    for x in 3..7 {
        let [r, ..] = out.pixel(x, 0);
        assert!(r <= 200);
    }
    assert_eq!(out.pixel(2, 0), [0, 0, 0, 255]);
    assert_eq!(out.pixel(7, 0), [200, 200, 200, 255]);
}

#[test]
fn test_inpainting_is_deterministic_and_local() {
    let image = test_image(16, 16);
    let mut region = Mask::new(16, 16);
    region.add_rectangle(4, 5, 6, 3);
    let filter = Filter::Inpainting { smoothing_passes: 2 };
    let a = filter.apply(&image, Some(&region)).unwrap();
    let b = filter.apply(&image, Some(&region)).unwrap();
    assert_eq!(a, b);
    for y in 0..16 {
        for x in 0..16 {
            if !region.get(x, y) {
                assert_eq!(a.pixel(x, y), image.pixel(x, y));
            }
        }
    }
}
